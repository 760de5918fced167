/// Receives failures that escaped a scheduled job.
pub trait UnhandledFailurePolicy: Send + Sync {
    fn on_unhandled_failure(&self, message: &str);
}

/// Logs escaped failures at error level and carries on.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogUnhandledFailures;

impl UnhandledFailurePolicy for LogUnhandledFailures {
    fn on_unhandled_failure(&self, message: &str) {
        tracing::error!(message, "unhandled failure in scheduled job");
    }
}
