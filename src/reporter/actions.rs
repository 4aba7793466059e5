//! Reporter implementation speaking GitHub Actions workflow commands.

use log::warn;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::Reporter;

/// Reports through workflow commands on stdout and the `GITHUB_OUTPUT` file.
///
/// Step outputs are appended to the file named by `GITHUB_OUTPUT` using the
/// heredoc format; when the variable is unset the legacy `::set-output`
/// command is emitted instead.
pub struct ActionsReporter {
    output_path: Option<PathBuf>,
}

impl ActionsReporter {
    /// Creates a reporter wired to the environment of the current step.
    pub fn from_env() -> Self {
        Self {
            output_path: env::var_os("GITHUB_OUTPUT").map(PathBuf::from),
        }
    }

    /// Creates a reporter writing step outputs to the given file.
    pub fn with_output_path(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    fn issue(&self, command: &str, message: &str) {
        println!("{}", format_command(command, message));
    }

    fn append_output(&self, path: &Path, key: &str, value: &str) -> io::Result<()> {
        let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}<<{}", key, delimiter)?;
        writeln!(file, "{}", value)?;
        writeln!(file, "{}", delimiter)?;
        Ok(())
    }
}

impl Reporter for ActionsReporter {
    fn debug(&self, message: &str) {
        self.issue("debug", message);
    }

    fn warning(&self, message: &str) {
        self.issue("warning", message);
    }

    fn set_output(&self, key: &str, value: &str) {
        match &self.output_path {
            Some(path) => {
                if let Err(e) = self.append_output(path, key, value) {
                    warn!("failed to write step output {:?} to {:?}: {}", key, path, e);
                }
            }
            None => println!(
                "::set-output name={}::{}",
                escape_property(key),
                escape_data(value)
            ),
        }
    }

    fn set_failed(&self, message: &str) {
        self.issue("error", message);
    }
}

fn format_command(command: &str, message: &str) -> String {
    format!("::{}::{}", command, escape_data(message))
}

/// Escapes command data per the workflow command protocol.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escapes command properties; these additionally encode `:` and `,`.
fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}
