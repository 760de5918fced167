use galena_ir::TestOutcome;
use galena_model::AbortSignal;

/// Cooperative cancellation of a whole run.
///
/// Every test and instance signal of a run descends from the token's signal,
/// so cancelling reaches running user code through `is_aborted` and keeps
/// any not yet started test from running.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    signal: AbortSignal,
}

impl CancellationToken {
    pub const MESSAGE: &'static str = "The test run was canceled.";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        tracing::debug!("run cancellation requested");
        self.signal.abort(TestOutcome::Canceled, Self::MESSAGE);
    }

    pub fn is_canceled(&self) -> bool {
        self.signal.is_aborted()
    }

    pub(crate) fn signal(&self) -> &AbortSignal {
        &self.signal
    }
}
