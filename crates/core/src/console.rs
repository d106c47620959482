//! Operator-facing console used by the workflow modes.
//!
//! Messages meant for the person running the migration go through a
//! [`Console`]; internal diagnostics go straight to `tracing`.

use tracing::{error, info, warn};

use crate::errors::MigrationError;

/// Operator console: reporting plus yes/no prompts.
pub trait Console {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);

    /// Ask the operator a yes/no question. Blocks until answered.
    fn prompt_confirmation(&self, message: &str) -> Result<bool, MigrationError>;
}

/// Non-interactive console that forwards everything to `tracing` and answers
/// prompts with a fixed value.
#[derive(Debug, Clone, Default)]
pub struct LogConsole {
    assume_yes: bool,
}

impl LogConsole {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Console for LogConsole {
    fn info(&self, message: &str) {
        info!(target: "console", "{}", message);
    }

    fn warn(&self, message: &str) {
        warn!(target: "console", "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: "console", "{}", message);
    }

    fn prompt_confirmation(&self, message: &str) -> Result<bool, MigrationError> {
        info!(
            target: "console",
            answer = self.assume_yes,
            "{} (answered automatically)",
            message
        );
        Ok(self.assume_yes)
    }
}

/// Prepends a fixed prefix to every message, e.g. `Change 2 of 5 (abc): `.
pub struct PrefixedConsole<'a> {
    prefix: String,
    inner: &'a dyn Console,
}

impl<'a> PrefixedConsole<'a> {
    pub fn new(prefix: impl Into<String>, inner: &'a dyn Console) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Console for PrefixedConsole<'_> {
    fn info(&self, message: &str) {
        self.inner.info(&format!("{}{}", self.prefix, message));
    }

    fn warn(&self, message: &str) {
        self.inner.warn(&format!("{}{}", self.prefix, message));
    }

    fn error(&self, message: &str) {
        self.inner.error(&format!("{}{}", self.prefix, message));
    }

    fn prompt_confirmation(&self, message: &str) -> Result<bool, MigrationError> {
        self.inner
            .prompt_confirmation(&format!("{}{}", self.prefix, message))
    }
}
