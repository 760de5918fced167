//! Guarded execution of lifecycle phases.
//!
//! A `Sandbox` runs one phase action at a time against an abort signal.
//! Regular phases are refused once the signal is aborted and report the
//! abort outcome instead; finalizers always run. Panics never escape a
//! phase: they are reported as `Failed` with the panic message.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use galena_ir::{panic_message, PhaseResult, TestFailure, TestOutcome};
use galena_model::AbortSignal;

/// Lifecycle phase, used for tracing and failure messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    BeforeTest,
    InitializeTest,
    DecorateTestInstance,
    BeforeInstance,
    Initialize,
    SetUp,
    Execute,
    TearDown,
    Dispose,
    AfterInstance,
    DecorateChildTest,
    DisposeTest,
    AfterTest,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::BeforeTest => "before test",
            Phase::InitializeTest => "initialize test",
            Phase::DecorateTestInstance => "decorate test instance",
            Phase::BeforeInstance => "before instance",
            Phase::Initialize => "initialize",
            Phase::SetUp => "set up",
            Phase::Execute => "execute",
            Phase::TearDown => "tear down",
            Phase::Dispose => "dispose",
            Phase::AfterInstance => "after instance",
            Phase::DecorateChildTest => "decorate child test",
            Phase::DisposeTest => "dispose test",
            Phase::AfterTest => "after test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one or more phases together with the message of the most
/// severe failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub outcome: TestOutcome,
    pub message: Option<String>,
}

impl PhaseOutcome {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn new(outcome: TestOutcome, message: impl Into<String>) -> Self {
        PhaseOutcome {
            outcome,
            message: Some(message.into()),
        }
    }

    pub fn from_failure(failure: TestFailure) -> Self {
        PhaseOutcome {
            outcome: failure.outcome,
            message: Some(failure.message),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Fold `other` in. A strictly more severe outcome takes over the
    /// message; otherwise the first message is kept.
    pub fn merge(&mut self, other: PhaseOutcome) {
        if other.outcome > self.outcome {
            *self = other;
        } else if self.message.is_none() && other.outcome == self.outcome {
            self.message = other.message;
        }
    }

    /// Fold in the outcome of a child or data-driven instance, generalized.
    pub fn merge_generalized(&mut self, outcome: TestOutcome) {
        self.outcome = self.outcome.combine(outcome.generalize());
    }
}

/// Runs phases of one test or instance against its abort signal.
#[derive(Clone, Debug)]
pub struct Sandbox {
    signal: AbortSignal,
}

impl Sandbox {
    pub fn new(signal: AbortSignal) -> Self {
        Sandbox { signal }
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// The abort outcome, if the signal has fired.
    pub fn aborted(&self) -> Option<PhaseOutcome> {
        self.signal
            .reason()
            .map(|reason| PhaseOutcome::new(reason.outcome, reason.message))
    }

    /// Run a regular phase. Not started when already aborted; an abort that
    /// fires while the phase runs overrides a successful result.
    pub fn run(&self, phase: Phase, action: impl FnOnce() -> PhaseResult) -> PhaseOutcome {
        if let Some(aborted) = self.aborted() {
            trace!(%phase, outcome = %aborted.outcome, "phase not started");
            return aborted;
        }
        let mut outcome = Self::guard(phase, action);
        if let Some(aborted) = self.aborted() {
            outcome.merge(aborted);
        }
        outcome
    }

    /// Run a finalizer. Always starts; reports only its own failure.
    pub fn run_finalizer(
        &self,
        phase: Phase,
        action: impl FnOnce() -> PhaseResult,
    ) -> PhaseOutcome {
        Self::guard(phase, action)
    }

    fn guard(phase: Phase, action: impl FnOnce() -> PhaseResult) -> PhaseOutcome {
        trace!(%phase, "phase started");
        let outcome = match catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => PhaseOutcome::passed(),
            Ok(Err(failure)) => PhaseOutcome::from_failure(failure),
            Err(payload) => PhaseOutcome::new(TestOutcome::Failed, panic_message(&*payload)),
        };
        trace!(%phase, outcome = %outcome.outcome, "phase finished");
        outcome
    }
}

struct Alarm {
    disarmed: Mutex<bool>,
    changed: Condvar,
}

/// Aborts a signal with `Timeout` unless dropped before the deadline.
pub struct Watchdog {
    alarm: Arc<Alarm>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm(timeout: Duration, signal: AbortSignal) -> Watchdog {
        let alarm = Arc::new(Alarm {
            disarmed: Mutex::new(false),
            changed: Condvar::new(),
        });
        let deadline = Instant::now() + timeout;
        let watched = Arc::clone(&alarm);
        let spawned = thread::Builder::new()
            .name("galena-watchdog".to_owned())
            .spawn(move || {
                let mut disarmed = watched.disarmed.lock();
                while !*disarmed {
                    if watched.changed.wait_until(&mut disarmed, deadline).timed_out() {
                        if !*disarmed {
                            signal.abort(TestOutcome::Timeout, timeout_message(timeout));
                        }
                        return;
                    }
                }
            });
        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, "failed to start a timeout watchdog; the timeout is not enforced");
                None
            }
        };
        Watchdog { alarm, thread }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        *self.alarm.disarmed.lock() = true;
        self.alarm.changed.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("disarmed", &*self.alarm.disarmed.lock())
            .finish_non_exhaustive()
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("The test timed out after {} seconds.", timeout.as_secs_f64())
}

#[cfg(test)]
mod tests;
