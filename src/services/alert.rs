//! Alert sink hook: tick errors are logged and optionally forwarded here.
//! The sink itself is an external collaborator — this trait only pins down
//! the seam so the tick driver doesn't hold a hidden global, with
//! constructed components passed into handlers rather than reached for as
//! statics.

use tracing::error;

pub trait AlertSink: Send + Sync {
    fn alert(&self, context: &str, message: &str);
}

/// Default sink: logs at `error!` level via `tracing`, the same crate the
/// rest of the engine uses for structured logging.
#[derive(Debug, Clone, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, context: &str, message: &str) {
        error!(context, message, "alert");
    }
}
