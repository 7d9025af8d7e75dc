// ── Mutation notifications ──
//
// Every mutation that reaches the remote service settles with exactly one
// notification. UIs turn these into toasts; the default sink logs them.

use tracing::{error, info};

use crate::error::CoreError;

/// Receives the outcome of each settled mutation.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn failure(&self, message: &str, error: &CoreError);
}

/// Logs outcomes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn failure(&self, message: &str, error: &CoreError) {
        error!(class = %error.class(), "{message}: {}", error.user_message());
    }
}
