//! Request execution: dispatch, classification, and terminal reporting.

use log::warn;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::config::{ClientConfig, Method, Options};
use crate::reporter::Reporter;

use super::retry::with_retry;
use super::transform;

/// The outgoing request before pre-processing.
///
/// An empty body means no body is sent.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub body: String,
}

/// A received HTTP response as plain data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Result of a request execution.
///
/// `Failed` means the failure was already reported through the reporter;
/// callers map it to a non-zero exit without reporting again.
#[derive(Debug)]
pub enum Outcome {
    /// A response was received and counts as success.
    Response(HttpResponse),
    /// A no-response failure was swallowed by `prevent_failure_on_no_response`.
    Suppressed,
    /// Terminal failure, already reported through the reporter.
    Failed,
}

/// A classified dispatch failure handed to the retry layer.
#[derive(Debug)]
pub enum DispatchError {
    /// The server answered with a non-success status outside the ignore list.
    Status { status: u16, body: String },
    /// The request went out but no response ever came back.
    NoResponse { source: reqwest::Error },
    /// The request could not be built or sent at all.
    Request { message: String },
}

impl DispatchError {
    /// Variant name used in the structured `request-error` output.
    pub fn name(&self) -> &'static str {
        match self {
            DispatchError::Status { .. } => "HttpStatusError",
            DispatchError::NoResponse { .. } => "NoResponseError",
            DispatchError::Request { .. } => "RequestError",
        }
    }

    /// Transport classification code for the structured output record.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Status { .. } => "http_status",
            DispatchError::NoResponse { source } if source.is_timeout() => "timeout",
            DispatchError::NoResponse { source } if source.is_connect() => "connect",
            DispatchError::NoResponse { .. } => "no_response",
            DispatchError::Request { .. } => "request",
        }
    }

    /// Response status, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Status { status, .. } => write!(f, "HTTP {} error", status),
            DispatchError::NoResponse { source } => write!(f, "no response received: {}", source),
            DispatchError::Request { message } => write!(f, "request failed: {}", message),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::NoResponse { source } => Some(source),
            _ => None,
        }
    }
}

/// Executes a request: pre-process once, dispatch with retries, classify,
/// and report terminal failures through the reporter.
///
/// Never panics or raises past this boundary; every failure path ends in
/// reporter calls and an [`Outcome`] variant.
#[tracing::instrument(skip(config, options, reporter))]
pub async fn execute(
    config: &ClientConfig,
    spec: &RequestSpec,
    options: &Options,
    reporter: &dyn Reporter,
) -> Outcome {
    reporter.debug(&format!("options: {:?}", options));

    let spec = transform::preprocess(spec, config.content_type(), options);

    reporter.debug(&format!("instance configuration: {:?}", config));
    reporter.debug(&format!("request data: {:?}", spec));

    let result = match config.build() {
        Ok(client) => {
            with_retry(options, || {
                dispatch(&client, config, &spec, options, reporter)
            })
            .await
        }
        Err(e) => Err(DispatchError::Request {
            message: format!("{:#}", e),
        }),
    };

    match result {
        Ok(Some(response)) => Outcome::Response(response),
        Ok(None) => Outcome::Suppressed,
        Err(error) => {
            report_failure(&error, &spec, reporter);
            Outcome::Failed
        }
    }
}

/// A single dispatch attempt with per-attempt classification.
///
/// Returns `Ok(Some(response))` on success (including ignored statuses),
/// `Ok(None)` for a suppressed no-response failure, and a [`DispatchError`]
/// for everything the retry layer should see.
#[tracing::instrument(skip(client, config, options, reporter))]
async fn dispatch(
    client: &Client,
    config: &ClientConfig,
    spec: &RequestSpec,
    options: &Options,
    reporter: &dyn Reporter,
) -> Result<Option<HttpResponse>, DispatchError> {
    let mut builder = client.request(spec.method.as_reqwest(), &spec.url);
    if let Some(auth) = &config.basic_auth {
        builder = builder.basic_auth(&auth.username, Some(&auth.password));
    }
    if !spec.body.is_empty() {
        builder = builder.body(spec.body.clone());
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return transport_error(e, options, reporter),
    };

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return transport_error(e, options, reporter),
    };

    let response = HttpResponse {
        status: status.as_u16(),
        headers,
        body,
    };

    if status.is_success() {
        return Ok(Some(response));
    }

    if options.ignored_status_codes.contains(&response.status) {
        reporter.warning(&format!(
            "ignored status code: {}",
            json!({ "code": response.status, "message": response.body })
        ));
        return Ok(Some(response));
    }

    Err(DispatchError::Status {
        status: response.status,
        body: response.body,
    })
}

/// Classifies a transport-layer error from `reqwest`.
fn transport_error(
    error: reqwest::Error,
    options: &Options,
    reporter: &dyn Reporter,
) -> Result<Option<HttpResponse>, DispatchError> {
    if error.is_builder() {
        return Err(DispatchError::Request {
            message: error.to_string(),
        });
    }

    // The request went out but nothing came back.
    if options.prevent_failure_on_no_response {
        reporter.warning(&format!("no response received: {}", error));
        return Ok(None);
    }

    Err(DispatchError::NoResponse { source: error })
}

#[derive(Debug, Serialize)]
struct RequestErrorRecord<'a> {
    name: &'a str,
    message: String,
    code: &'a str,
    status: Option<u16>,
}

/// Publishes the structured `request-error` output and the failure message.
fn report_failure(error: &DispatchError, spec: &RequestSpec, reporter: &dyn Reporter) {
    let record = RequestErrorRecord {
        name: error.name(),
        message: error.to_string(),
        code: error.code(),
        status: error.status(),
    };
    match serde_json::to_string(&record) {
        Ok(record) => reporter.set_output("request-error", &record),
        Err(e) => warn!("failed to serialize request-error record: {}", e),
    }

    let message = match error {
        DispatchError::Status { status, body } => {
            json!({ "code": status, "message": body })
        }
        DispatchError::NoResponse { source } => {
            json!({
                "error": "no response received",
                "message": source.to_string(),
                "cause": format!("{:?}", source),
            })
        }
        DispatchError::Request { message } => {
            json!({ "message": message, "data": spec.body })
        }
    };
    reporter.set_failed(&message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transform::CONTENT_TYPE_URLENCODED;
    use crate::reporter::MockReporter;
    use std::collections::HashSet;
    use std::time::Duration;

    fn quiet_reporter() -> MockReporter {
        let mut reporter = MockReporter::new();
        reporter.expect_debug().returning(|_| ());
        reporter
    }

    fn options() -> Options {
        Options {
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn spec(method: Method, url: String, body: &str) -> RequestSpec {
        RequestSpec {
            method,
            url,
            body: body.to_string(),
        }
    }

    // Nothing listens on port 9 of localhost; connecting fails without a
    // response ever being received.
    fn unreachable_url() -> String {
        "http://127.0.0.1:9/".to_string()
    }

    fn short_timeout_config() -> ClientConfig {
        ClientConfig {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("ok")
            .create_async()
            .await;

        let reporter = quiet_reporter();
        let outcome = execute(
            &ClientConfig::default(),
            &spec(Method::Post, format!("{}/hook", server.url()), "{}"),
            &options(),
            &reporter,
        )
        .await;

        mock.assert_async().await;
        match outcome {
            Outcome::Response(response) => {
                assert_eq!(response.status, 200);
                assert_eq!(response.body, "ok");
                assert!(
                    response
                        .headers
                        .iter()
                        .any(|(name, value)| name == "content-type" && value == "text/plain")
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_get_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body("pong")
            .create_async()
            .await;

        let reporter = quiet_reporter();
        let outcome = execute(
            &ClientConfig::default(),
            &spec(Method::Get, format!("{}/ping", server.url()), "{}"),
            &options(),
            &reporter,
        )
        .await;

        mock.assert_async().await;
        assert!(matches!(outcome, Outcome::Response(_)));
    }

    #[tokio::test]
    async fn test_execute_ignored_status_is_success_with_one_warning() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let mut reporter = quiet_reporter();
        reporter
            .expect_warning()
            .withf(|message: &str| {
                message.starts_with("ignored status code:") && message.contains("not here")
            })
            .times(1)
            .returning(|_| ());

        let outcome = execute(
            &ClientConfig::default(),
            &spec(Method::Get, format!("{}/missing", server.url()), ""),
            &Options {
                ignored_status_codes: HashSet::from([404]),
                ..options()
            },
            &reporter,
        )
        .await;

        mock.assert_async().await;
        match outcome {
            Outcome::Response(response) => {
                assert_eq!(response.status, 404);
                assert_eq!(response.body, "not here");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_status_error_reports_failure_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/boom")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut reporter = quiet_reporter();
        reporter
            .expect_set_output()
            .withf(|key: &str, value: &str| {
                key == "request-error"
                    && value.contains("\"code\":\"http_status\"")
                    && value.contains("\"status\":500")
            })
            .times(1)
            .returning(|_, _| ());
        reporter
            .expect_set_failed()
            .withf(|message: &str| {
                message.contains("\"code\":500") && message.contains("boom")
            })
            .times(1)
            .returning(|_| ());

        let outcome = execute(
            &ClientConfig::default(),
            &spec(Method::Get, format!("{}/boom", server.url()), ""),
            &options(),
            &reporter,
        )
        .await;

        mock.assert_async().await;
        assert!(matches!(outcome, Outcome::Failed));
    }

    #[tokio::test]
    async fn test_execute_suppresses_no_response_failure() {
        let mut reporter = quiet_reporter();
        reporter
            .expect_warning()
            .withf(|message: &str| message.starts_with("no response received:"))
            .times(1)
            .returning(|_| ());

        let outcome = execute(
            &short_timeout_config(),
            &spec(Method::Get, unreachable_url(), ""),
            &Options {
                prevent_failure_on_no_response: true,
                ..options()
            },
            &reporter,
        )
        .await;

        assert!(matches!(outcome, Outcome::Suppressed));
    }

    #[tokio::test]
    async fn test_execute_no_response_fails_without_suppression_flag() {
        let mut reporter = quiet_reporter();
        reporter
            .expect_set_output()
            .withf(|key: &str, _: &str| key == "request-error")
            .times(1)
            .returning(|_, _| ());
        reporter
            .expect_set_failed()
            .withf(|message: &str| message.contains("no response received"))
            .times(1)
            .returning(|_| ());

        let outcome = execute(
            &short_timeout_config(),
            &spec(Method::Get, unreachable_url(), ""),
            &options(),
            &reporter,
        )
        .await;

        assert!(matches!(outcome, Outcome::Failed));
    }

    #[tokio::test]
    async fn test_execute_retries_failing_attempts_then_reports_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .with_body("still broken")
            .expect(3)
            .create_async()
            .await;

        let mut reporter = quiet_reporter();
        reporter
            .expect_set_output()
            .withf(|key: &str, _: &str| key == "request-error")
            .times(1)
            .returning(|_, _| ());
        reporter.expect_set_failed().times(1).returning(|_| ());

        let outcome = execute(
            &ClientConfig::default(),
            &spec(Method::Get, format!("{}/flaky", server.url()), ""),
            &Options {
                retry_count: 2,
                ..options()
            },
            &reporter,
        )
        .await;

        mock.assert_async().await;
        assert!(matches!(outcome, Outcome::Failed));
    }

    #[tokio::test]
    async fn test_execute_form_encodes_urlencoded_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/form")
            .match_header("content-type", CONTENT_TYPE_URLENCODED)
            .match_body("a=1&b=2")
            .with_status(200)
            .create_async()
            .await;

        let mut config = ClientConfig::default();
        config.set_header("Content-Type", CONTENT_TYPE_URLENCODED);

        let reporter = quiet_reporter();
        let outcome = execute(
            &config,
            &spec(
                Method::Post,
                format!("{}/form", server.url()),
                r#"{"a":"1","b":"2"}"#,
            ),
            &options(),
            &reporter,
        )
        .await;

        mock.assert_async().await;
        assert!(matches!(outcome, Outcome::Response(_)));
    }

    #[test]
    fn test_dispatch_error_classification() {
        let status = DispatchError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(status.name(), "HttpStatusError");
        assert_eq!(status.code(), "http_status");
        assert_eq!(status.status(), Some(503));

        let request = DispatchError::Request {
            message: "bad header".to_string(),
        };
        assert_eq!(request.name(), "RequestError");
        assert_eq!(request.code(), "request");
        assert_eq!(request.status(), None);
    }

    #[test]
    fn test_dispatch_error_display() {
        let error = DispatchError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 500 error");

        let error = DispatchError::Request {
            message: "no scheme".to_string(),
        };
        assert_eq!(error.to_string(), "request failed: no scheme");
    }
}
