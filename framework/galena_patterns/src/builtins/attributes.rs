//! Patterns that set properties and metadata of the enclosing test.

use std::time::Duration;

use galena_ir::{CodeElement, TestFailure};
use galena_model::{Metadata, Test};

use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId};

/// The test declared by `scope`, or a usage error if `scope` declares a
/// parameter instead.
fn declared_test<'a>(
    evaluator: &'a mut Evaluator,
    scope: ScopeId,
    element: CodeElement,
    what: &str,
) -> Result<&'a mut Test, PatternError> {
    if evaluator.scope(scope).parameter.is_some() {
        let code = evaluator.code();
        return Err(PatternError::usage(format!(
            "{what} applies to tests, but {} '{}' is a parameter",
            code.kind(element),
            code.full_name(element)
        )));
    }
    Ok(evaluator.test_mut(scope))
}

/// Adds a metadata entry to the test or parameter.
#[derive(Clone, Debug)]
pub struct MetadataPattern {
    key: String,
    value: String,
}

impl MetadataPattern {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        MetadataPattern {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn category(value: impl Into<String>) -> Self {
        Self::new(Metadata::CATEGORY, value)
    }

    pub fn description(value: impl Into<String>) -> Self {
        Self::new(Metadata::DESCRIPTION, value)
    }

    pub fn author(value: impl Into<String>) -> Self {
        Self::new(Metadata::AUTHOR, value)
    }
}

impl Pattern for MetadataPattern {
    fn name(&self) -> &str {
        "Metadata"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        _element: CodeElement,
    ) -> PatternResult {
        let (key, value) = (self.key.clone(), self.value.clone());
        match evaluator.parameter_mut(scope) {
            Some(parameter) => parameter.metadata.add(key, value),
            None => evaluator.test_mut(scope).metadata.add(key, value),
        }
        Ok(())
    }
}

/// Aborts instances that run longer than the limit.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutPattern(pub Duration);

impl Pattern for TimeoutPattern {
    fn name(&self) -> &str {
        "Timeout"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        declared_test(evaluator, scope, element, "a timeout")?.timeout = Some(self.0);
        Ok(())
    }
}

/// Allows the test to run concurrently with its siblings.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelizablePattern;

impl Pattern for ParallelizablePattern {
    fn name(&self) -> &str {
        "Parallelizable"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        declared_test(evaluator, scope, element, "parallelizable")?.is_parallelizable = true;
        Ok(())
    }
}

/// Runs the test only when it is selected explicitly.
#[derive(Clone, Debug, Default)]
pub struct ExplicitPattern {
    reason: Option<String>,
}

impl ExplicitPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        ExplicitPattern {
            reason: Some(reason.into()),
        }
    }
}

impl Pattern for ExplicitPattern {
    fn name(&self) -> &str {
        "Explicit"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        let test = declared_test(evaluator, scope, element, "explicit")?;
        test.is_explicit = true;
        if let Some(reason) = &self.reason {
            test.metadata.add(Metadata::EXPLICIT_REASON, reason.clone());
        }
        Ok(())
    }
}

/// Position among siblings; lower runs first.
#[derive(Clone, Copy, Debug)]
pub struct OrderPattern(pub i32);

impl Pattern for OrderPattern {
    fn name(&self) -> &str {
        "Order"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        declared_test(evaluator, scope, element, "an order")?.order = self.0;
        Ok(())
    }
}

/// Skips the test with a reason. The test still appears in the model.
#[derive(Clone, Debug)]
pub struct IgnorePattern {
    reason: String,
}

impl IgnorePattern {
    pub fn new(reason: impl Into<String>) -> Self {
        IgnorePattern {
            reason: reason.into(),
        }
    }
}

impl Pattern for IgnorePattern {
    fn name(&self) -> &str {
        "Ignore"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        declared_test(evaluator, scope, element, "ignore")?
            .metadata
            .add(Metadata::IGNORE_REASON, self.reason.clone());
        let reason = self.reason.clone();
        evaluator.add_decorator(scope, i32::MIN, move |ev, scope| {
            ev.test_mut(scope)
                .actions
                .before_test
                .before(move |_| Err(TestFailure::skipped(reason.clone())));
            Ok(())
        })
    }
}
