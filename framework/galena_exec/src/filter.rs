//! Test selection.

use galena_ir::TestId;
use galena_model::{Test, TestKind, TestModel};

/// A predicate over tests of a model.
///
/// Filters only decide whether a test is selected directly; which ancestors
/// and descendants run as a consequence is decided by `RunPlan`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TestFilter {
    /// Every test.
    #[default]
    All,
    /// Exactly this test.
    Id(TestId),
    /// The test with this stable id.
    StableId(String),
    /// Tests whose name contains the text.
    Name(String),
    /// Tests carrying this metadata pair.
    Metadata { key: String, value: String },
    Kind(TestKind),
    And(Vec<TestFilter>),
    Or(Vec<TestFilter>),
    Not(Box<TestFilter>),
}

impl TestFilter {
    pub fn name(text: impl Into<String>) -> Self {
        TestFilter::Name(text.into())
    }

    pub fn stable_id(id: impl Into<String>) -> Self {
        TestFilter::StableId(id.into())
    }

    pub fn metadata(key: impl Into<String>, value: impl Into<String>) -> Self {
        TestFilter::Metadata {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn category(value: impl Into<String>) -> Self {
        Self::metadata(galena_model::Metadata::CATEGORY, value)
    }

    #[must_use]
    pub fn and(self, other: TestFilter) -> Self {
        match self {
            TestFilter::And(mut parts) => {
                parts.push(other);
                TestFilter::And(parts)
            }
            this => TestFilter::And(vec![this, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: TestFilter) -> Self {
        match self {
            TestFilter::Or(mut parts) => {
                parts.push(other);
                TestFilter::Or(parts)
            }
            this => TestFilter::Or(vec![this, other]),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        TestFilter::Not(Box::new(self))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TestFilter::All)
    }

    pub fn matches(&self, test: &Test) -> bool {
        match self {
            TestFilter::All => true,
            TestFilter::Id(id) => test.id == *id,
            TestFilter::StableId(stable_id) => test.stable_id == *stable_id,
            TestFilter::Name(text) => test.name.contains(text.as_str()),
            TestFilter::Metadata { key, value } => test.metadata.contains(key, value),
            TestFilter::Kind(kind) => test.kind == *kind,
            TestFilter::And(parts) => parts.iter().all(|part| part.matches(test)),
            TestFilter::Or(parts) => parts.iter().any(|part| part.matches(test)),
            TestFilter::Not(inner) => !inner.matches(test),
        }
    }

    /// Ids of every test in `model` this filter selects directly.
    pub fn select(&self, model: &TestModel) -> Vec<TestId> {
        model
            .tests()
            .filter(|test| self.matches(test))
            .map(|test| test.id)
            .collect()
    }
}
