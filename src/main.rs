use anyhow::{Context, Result, bail};
use clap::Parser;
use hra::config::{
    BasicAuth, ClientConfig, DEFAULT_RETRY_WAIT_MS, Method, Options, parse_bool, parse_header_map,
    parse_status_codes,
};
use hra::http::{self, HttpResponse, Outcome, RequestSpec};
use hra::reporter::{ActionsReporter, Reporter};
use serde_json::Value;
use std::process::ExitCode;
use std::time::Duration;

/// hra - HTTP Request Action
///
/// Send an HTTP request from a workflow step and publish the response as step
/// outputs. Every flag can also be supplied through the INPUT_* environment
/// variable the Actions runner sets for the matching step input.
///
/// Examples:
///   hra --url https://api.example.com/trigger --method POST --data '{"ref":"main"}'
#[derive(Parser, Debug)]
#[command(author, version = env!("HRA_VERSION"), about)]
struct Cli {
    /// Request URL
    #[arg(long, env = "INPUT_URL", value_name = "URL")]
    url: String,

    /// HTTP method (GET or POST)
    #[arg(long, env = "INPUT_METHOD", default_value = "GET", value_name = "METHOD")]
    method: String,

    /// Request body
    #[arg(long, env = "INPUT_DATA", default_value = "{}", value_name = "BODY")]
    data: String,

    /// Content-Type header of the request
    #[arg(long, env = "INPUT_CONTENTTYPE", value_name = "TYPE")]
    content_type: Option<String>,

    /// Custom headers as a JSON object
    #[arg(long, env = "INPUT_CUSTOMHEADERS", value_name = "JSON")]
    headers: Option<String>,

    /// Basic auth username
    #[arg(long, env = "INPUT_USERNAME", value_name = "USER")]
    username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "INPUT_PASSWORD", value_name = "PASS")]
    password: Option<String>,

    /// Bearer token sent in the Authorization header
    #[arg(long, env = "INPUT_BEARERTOKEN", value_name = "TOKEN")]
    bearer_token: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, env = "INPUT_TIMEOUT", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Response status codes treated as success (comma-separated)
    #[arg(long, env = "INPUT_IGNORESTATUSCODES", value_name = "CODES")]
    ignore_status_codes: Option<String>,

    /// Escape newlines inside quoted body segments (true/false)
    #[arg(
        long,
        env = "INPUT_ESCAPEDATA",
        default_value = "false",
        value_name = "BOOL"
    )]
    escape_data: String,

    /// Swallow network failures where no response was received (true/false)
    #[arg(
        long,
        env = "INPUT_PREVENTFAILUREONNORESPONSE",
        default_value = "false",
        value_name = "BOOL"
    )]
    prevent_failure_on_no_response: String,

    /// Number of retries after a failed attempt
    #[arg(long, env = "INPUT_RETRY", default_value_t = 0, value_name = "COUNT")]
    retry: u32,

    /// Wait between retry attempts in milliseconds
    #[arg(
        long,
        env = "INPUT_RETRYWAIT",
        default_value_t = DEFAULT_RETRY_WAIT_MS,
        value_name = "MS"
    )]
    retry_wait: u64,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut client_config = ClientConfig::default();
        if let Some(raw) = &self.headers {
            client_config.headers = parse_header_map(raw).context("invalid --headers input")?;
        }
        if let Some(content_type) = &self.content_type {
            client_config.set_header("Content-Type", content_type);
        }
        client_config.basic_auth = match (&self.username, &self.password) {
            (Some(username), password) => Some(BasicAuth {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
            }),
            (None, Some(_)) => bail!("--password requires --username"),
            (None, None) => None,
        };
        client_config.bearer_token = self.bearer_token.clone();
        client_config.timeout = self.timeout_ms.map(Duration::from_millis);
        Ok(client_config)
    }

    fn options(&self) -> Result<Options> {
        let ignored_status_codes = match &self.ignore_status_codes {
            Some(raw) => {
                parse_status_codes(raw).context("invalid --ignore-status-codes input")?
            }
            None => Default::default(),
        };
        Ok(Options {
            ignored_status_codes,
            prevent_failure_on_no_response: parse_bool(&self.prevent_failure_on_no_response)
                .context("invalid --prevent-failure-on-no-response input")?,
            escape_data: parse_bool(&self.escape_data).context("invalid --escape-data input")?,
            retry_count: self.retry,
            retry_delay: Duration::from_millis(self.retry_wait),
        })
    }

    fn request_spec(&self) -> Result<RequestSpec> {
        let method: Method = self.method.parse()?;
        Ok(RequestSpec {
            method,
            url: self.url.clone(),
            body: self.data.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let reporter = ActionsReporter::from_env();

    match run(cli, &reporter).await {
        Ok(code) => code,
        Err(e) => {
            // Validation failures get the same error annotation as request failures.
            reporter.set_failed(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, reporter: &dyn Reporter) -> Result<ExitCode> {
    let client_config = cli.client_config()?;
    let options = cli.options()?;
    let spec = cli.request_spec()?;

    Ok(match http::execute(&client_config, &spec, &options, reporter).await {
        Outcome::Response(response) => {
            publish_response(&response, reporter);
            ExitCode::SUCCESS
        }
        Outcome::Suppressed => ExitCode::SUCCESS,
        Outcome::Failed => ExitCode::FAILURE,
    })
}

fn publish_response(response: &HttpResponse, reporter: &dyn Reporter) {
    reporter.set_output("response", &response.body);
    reporter.set_output("headers", &header_json(&response.headers));
    reporter.set_output("status", &response.status.to_string());
}

/// Renders response headers as a JSON object; repeated names keep the last value.
fn header_json(headers: &[(String, String)]) -> String {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        map.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(map).to_string()
}
