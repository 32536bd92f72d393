//! User-visible notifications raised by the coordinator.

/// Receives messages meant for the person running the analysis.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Routes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
