//! Abort signals.
//!
//! Every running test and instance owns a signal linked to the signal of the
//! context that started it. Aborting a signal aborts everything beneath it:
//! a timeout on a fixture reaches every test the fixture is running, and
//! cancelling the root reaches the whole run.

use std::sync::Arc;

use parking_lot::Mutex;

use galena_ir::TestOutcome;

/// Why a context was aborted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbortReason {
    pub outcome: TestOutcome,
    pub message: String,
}

#[derive(Debug, Default)]
struct Node {
    reason: Mutex<Option<AbortReason>>,
    parent: Option<AbortSignal>,
}

/// Cooperative abort flag with parent propagation.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    node: Arc<Node>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is aborted whenever `self` is.
    #[must_use]
    pub fn child(&self) -> AbortSignal {
        AbortSignal {
            node: Arc::new(Node {
                reason: Mutex::new(None),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Abort with `outcome`. The first abort wins.
    pub fn abort(&self, outcome: TestOutcome, message: impl Into<String>) {
        let mut reason = self.node.reason.lock();
        if reason.is_none() {
            *reason = Some(AbortReason {
                outcome,
                message: message.into(),
            });
        }
    }

    /// Reason of the nearest aborted signal, self first.
    pub fn reason(&self) -> Option<AbortReason> {
        let mut cursor = Some(self);
        while let Some(signal) = cursor {
            if let Some(reason) = signal.node.reason.lock().clone() {
                return Some(reason);
            }
            cursor = signal.node.parent.as_ref();
        }
        None
    }

    pub fn is_aborted(&self) -> bool {
        self.reason().is_some()
    }
}
