//! Operator console backed by the terminal.

use dialoguer::Confirm;
use tracing::debug;

use revmigrate_core::console::Console;
use revmigrate_core::errors::MigrationError;

use crate::style;

/// Prints styled messages to stderr and asks confirmations with
/// `dialoguer`. Without an attended terminal, prompts are declined unless
/// `--yes` was given.
pub struct TerminalConsole {
    assume_yes: bool,
    attended: bool,
}

impl TerminalConsole {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            attended: console::Term::stderr().is_term(),
        }
    }
}

impl Console for TerminalConsole {
    fn info(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", style::warn(message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", style::error(message));
    }

    fn prompt_confirmation(&self, message: &str) -> Result<bool, MigrationError> {
        if self.assume_yes {
            eprintln!("{} {}", message, style::dim("[--yes]"));
            return Ok(true);
        }
        if !self.attended {
            debug!(prompt = message, "no terminal attached, declining");
            eprintln!("{} {}", message, style::dim("[no terminal, answering no]"));
            return Ok(false);
        }

        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|e| MigrationError::repository_with_source("failed to read confirmation", e))
    }
}
