//! Reporter capability for workflow-facing output.
//!
//! The executor never writes to the console or process state directly; every
//! user-visible message and step output goes through this trait. Passing the
//! reporter in explicitly keeps the executor testable in isolation.

mod actions;

pub use actions::ActionsReporter;

#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send + Sync {
    /// Diagnostic line, hidden unless step debug logging is enabled.
    fn debug(&self, message: &str);

    /// Warning annotation shown in the workflow run.
    fn warning(&self, message: &str);

    /// Publishes a step output under the given key.
    fn set_output(&self, key: &str, value: &str);

    /// Reports a failure message; the step is expected to exit non-zero.
    fn set_failed(&self, message: &str);
}
