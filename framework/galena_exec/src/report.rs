//! Step results and the run report.
//!
//! Every test run opens one primary step. A data-driven test additionally
//! opens one child step per instance, and the children of that instance
//! report beneath it. Listeners see steps as they start and finish; the
//! `RunReport` keeps every finished step.

use std::fmt;
use std::time::Duration;

use galena_ir::{TestId, TestOutcome};

/// Identifier of a step within one run.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct StepId(u32);

impl StepId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        StepId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({})", self.0)
    }
}

/// Static description of a step, known when it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepInfo {
    pub id: StepId,
    pub parent: Option<StepId>,
    pub test: TestId,
    pub name: String,
    /// Test names from the outermost container down to this step.
    pub full_name: String,
    /// The step opened for the test itself, as opposed to one of its
    /// data-driven instances.
    pub is_primary: bool,
    /// Counts towards the run's test-case totals.
    pub is_test_case: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepResult {
    pub step: StepInfo,
    pub outcome: TestOutcome,
    /// Message of the most severe failure, if any.
    pub message: Option<String>,
    pub duration: Duration,
    pub log: Vec<String>,
}

/// Streaming observer of a run. Called from whichever thread runs the step.
pub trait RunListener: Send + Sync {
    fn step_started(&self, _step: &StepInfo) {}

    fn step_finished(&self, _result: &StepResult) {}
}

/// Listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl RunListener for NullListener {}

/// Every finished step of a run, in completion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    results: Vec<StepResult>,
    pub duration: Duration,
}

impl RunReport {
    pub(crate) fn new(results: Vec<StepResult>, duration: Duration) -> Self {
        RunReport { results, duration }
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    /// The primary step of `test`, if it ran.
    pub fn primary(&self, test: TestId) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|result| result.step.test == test && result.step.is_primary)
    }

    pub fn outcome_of(&self, test: TestId) -> Option<TestOutcome> {
        self.primary(test).map(|result| result.outcome)
    }

    /// Primary step of the first test whose full name is `full_name`.
    pub fn find(&self, full_name: &str) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|result| result.step.is_primary && result.step.full_name == full_name)
    }

    /// Steps opened for the instances of a data-driven test.
    pub fn instances_of(&self, test: TestId) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(move |result| result.step.test == test && !result.step.is_primary)
    }

    pub fn test_cases(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| result.step.is_test_case)
    }

    pub fn test_case_count(&self) -> usize {
        self.test_cases().count()
    }

    pub fn count(&self, outcome: TestOutcome) -> usize {
        self.test_cases()
            .filter(|result| result.outcome == outcome)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.test_cases().any(|result| result.outcome.is_failure())
    }

    /// Merge of every test-case outcome; `Passed` for an empty run.
    pub fn outcome(&self) -> TestOutcome {
        self.test_cases()
            .fold(TestOutcome::Passed, |acc, result| acc.combine(result.outcome))
    }

    /// Process exit code: 0 when every test case passed or was skipped,
    /// 1 when any failed, 2 when no test case ran.
    pub fn exit_code(&self) -> i32 {
        if self.test_case_count() == 0 {
            2
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} test cases: {} passed, {} failed, {} skipped, {} inconclusive",
            self.test_case_count(),
            self.count(TestOutcome::Passed),
            self.test_cases()
                .filter(|result| result.outcome.is_failure())
                .count(),
            self.count(TestOutcome::Skipped),
            self.count(TestOutcome::Inconclusive),
        )
    }
}
