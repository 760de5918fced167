//! Outcome lattice and user-code failures.

use std::fmt;

/// Terminal status of a test, instance or phase.
///
/// Variants are declared in ascending severity, so the derived `Ord` is the
/// merge order:
///
/// ```text
/// Passed < Skipped < Inconclusive < Failed < Error < Timeout < Canceled
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestOutcome {
    #[default]
    Passed,
    Skipped,
    Inconclusive,
    Failed,
    Error,
    Timeout,
    Canceled,
}

impl TestOutcome {
    /// Merge two outcomes; the more severe one wins.
    #[inline]
    #[must_use]
    pub fn combine(self, other: TestOutcome) -> TestOutcome {
        self.max(other)
    }

    /// Coarse form of an outcome inherited from children or data-driven
    /// instances: anything other than a pass becomes `Inconclusive`.
    #[must_use]
    pub fn generalize(self) -> TestOutcome {
        match self {
            TestOutcome::Passed | TestOutcome::Skipped => TestOutcome::Passed,
            _ => TestOutcome::Inconclusive,
        }
    }

    #[inline]
    pub fn is_passed(self) -> bool {
        self == TestOutcome::Passed
    }

    /// Whether the outcome reflects a defect rather than a choice not to run.
    pub fn is_failure(self) -> bool {
        self >= TestOutcome::Failed
    }

    pub fn label(self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Skipped => "skipped",
            TestOutcome::Inconclusive => "inconclusive",
            TestOutcome::Failed => "failed",
            TestOutcome::Error => "error",
            TestOutcome::Timeout => "timeout",
            TestOutcome::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure raised by user code or a phase action.
///
/// Carries the outcome the phase should report; plain assertion failures use
/// `Failed`, environmental problems use `Error`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{outcome}: {message}")]
pub struct TestFailure {
    pub outcome: TestOutcome,
    pub message: String,
}

impl TestFailure {
    pub fn new(outcome: TestOutcome, message: impl Into<String>) -> Self {
        TestFailure {
            outcome,
            message: message.into(),
        }
    }

    #[cold]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(TestOutcome::Failed, message)
    }

    #[cold]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TestOutcome::Error, message)
    }

    #[cold]
    pub fn inconclusive(message: impl Into<String>) -> Self {
        Self::new(TestOutcome::Inconclusive, message)
    }

    #[cold]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self::new(TestOutcome::Skipped, message)
    }
}

/// Result of running one phase action.
pub type PhaseResult = Result<(), TestFailure>;

#[cfg(test)]
mod tests;
