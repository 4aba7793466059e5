//! HTTP request execution with pre-processing, retry, and classification.

mod client;
mod retry;
mod transform;

pub use client::{DispatchError, HttpResponse, Outcome, RequestSpec, execute};
pub use retry::with_retry;
pub use transform::{
    CONTENT_TYPE_URLENCODED, escape_quoted_newlines, form_urlencode_json, preprocess,
};
