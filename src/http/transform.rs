//! Body pre-processing applied before dispatch.
//!
//! Three transforms run in a fixed order: quoted-newline escaping, GET body
//! removal, and form re-encoding for URL-encoded content types. They run once
//! per execution; retries reuse the already-transformed request.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;
use url::form_urlencoded;

use crate::config::{Method, Options};

use super::client::RequestSpec;

/// Content type that triggers JSON-to-form re-encoding.
pub const CONTENT_TYPE_URLENCODED: &str = "application/x-www-form-urlencoded";

static QUOTED_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*""#).expect("hard-coded pattern"));
static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r]\s*").expect("hard-coded pattern"));

/// Applies the configured transforms to a request.
///
/// `content_type` is the declared Content-Type header of the client
/// configuration, compared verbatim against [`CONTENT_TYPE_URLENCODED`].
pub fn preprocess(spec: &RequestSpec, content_type: Option<&str>, options: &Options) -> RequestSpec {
    let mut spec = spec.clone();

    if options.escape_data {
        spec.body = escape_quoted_newlines(&spec.body);
    }

    // GET requests never carry a body, whatever the caller supplied.
    if spec.method == Method::Get {
        spec.body = String::new();
    }

    if content_type == Some(CONTENT_TYPE_URLENCODED) {
        if let Some(form) = form_urlencode_json(&spec.body) {
            spec.body = form;
        }
    }

    spec
}

/// Replaces newline runs inside double-quoted substrings with a literal `\n`.
///
/// Text outside quotes is untouched. This keeps multi-line text embedded in a
/// quoted JSON string field well-formed for downstream JSON consumers.
pub fn escape_quoted_newlines(body: &str) -> String {
    QUOTED_SEGMENT
        .replace_all(body, |caps: &Captures<'_>| {
            NEWLINE_RUN.replace_all(&caps[0], r"\n").into_owned()
        })
        .into_owned()
}

/// Re-encodes a JSON object body as a URL-encoded form string.
///
/// Returns `None` when the body is not JSON, not an object, or an empty
/// object — the caller keeps the body unchanged in those cases. Object key
/// order is preserved; non-string values keep their JSON rendering.
pub fn form_urlencode_json(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }

    let mut form = form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form.append_pair(key, &value);
    }
    Some(form.finish())
}
