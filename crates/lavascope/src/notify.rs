//! Mutation outcome sink for the terminal.
//!
//! Successes get a one-line confirmation on stderr. Failures are left to
//! the miette report printed by `main`, so they are only logged here.

use lavascope_core::{CoreError, Notifier};

use crate::output;

#[derive(Debug, Clone, Copy)]
pub struct CliNotifier {
    quiet: bool,
    color: bool,
}

impl CliNotifier {
    pub fn new(quiet: bool, color: bool) -> Self {
        Self { quiet, color }
    }
}

impl Notifier for CliNotifier {
    fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", output::success_line(message, self.color));
        }
    }

    fn failure(&self, message: &str, error: &CoreError) {
        tracing::debug!(class = %error.class(), "{message}: {error}");
    }
}
