//! Typed request configuration parsed from raw step inputs.
//!
//! GitHub Actions delivers every step input as a string, so this module owns
//! the boundary parsing: comma-separated status code lists, JSON header maps,
//! boolean strings, and millisecond durations all become typed fields here.
//! Anything invalid is rejected before a request is ever built.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default wait between retry attempts in milliseconds.
pub const DEFAULT_RETRY_WAIT_MS: u64 = 3000;

/// HTTP method of the outgoing request. Only GET and POST are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            other => bail!("unsupported HTTP method {:?} (expected GET or POST)", other),
        }
    }
}

/// Basic authentication credentials.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Connection-level configuration for the HTTP client.
///
/// Headers keep their insertion order; when the same name is set twice the
/// first occurrence wins in [`ClientConfig::content_type`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Returns the declared Content-Type header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Builds a `reqwest::Client` carrying the configured default headers,
    /// bearer token, and timeout. Basic auth is applied per request.
    pub fn build(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {:?}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {:?}", name))?;
            headers.insert(name, value);
        }
        if let Some(token) = &self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("bearer token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("failed to build HTTP client")
    }
}

/// Behavior modifiers for a request execution.
#[derive(Debug, Clone)]
pub struct Options {
    /// Error statuses treated as success. Default: empty.
    pub ignored_status_codes: HashSet<u16>,
    /// Swallow network failures where no response was received. Default: off.
    pub prevent_failure_on_no_response: bool,
    /// Escape newlines inside quoted body segments. Default: off.
    pub escape_data: bool,
    /// Number of retries after the first attempt. Default: 0.
    pub retry_count: u32,
    /// Wait between attempts. Default: [`DEFAULT_RETRY_WAIT_MS`].
    pub retry_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignored_status_codes: HashSet::new(),
            prevent_failure_on_no_response: false,
            escape_data: false,
            retry_count: 0,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_WAIT_MS),
        }
    }
}

/// Parses a comma-separated status code list, e.g. `"304, 404"`.
/// Empty input yields an empty set.
pub fn parse_status_codes(input: &str) -> Result<HashSet<u16>> {
    let mut codes = HashSet::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let code = part
            .parse::<u16>()
            .with_context(|| format!("invalid status code {:?}", part))?;
        codes.insert(code);
    }
    Ok(codes)
}

/// Parses a JSON object of custom headers, e.g. `{"X-Api-Key": "abc"}`.
/// Non-string values keep their JSON rendering.
pub fn parse_header_map(input: &str) -> Result<Vec<(String, String)>> {
    let map: serde_json::Map<String, Value> =
        serde_json::from_str(input).context("headers input is not a JSON object")?;
    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Parses a boolean step input. Empty input counts as false.
pub fn parse_bool(input: &str) -> Result<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "" | "false" | "no" | "0" => Ok(false),
        other => bail!("invalid boolean value {:?}", other),
    }
}
