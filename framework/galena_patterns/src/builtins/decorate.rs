use std::sync::Arc;

use galena_ir::{CodeElement, TestFailure, TestOutcome};
use galena_model::TestActions;

use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId, SharedPattern, TestParts};

type Decoration = Arc<dyn Fn(&mut TestActions) + Send + Sync>;

/// Arbitrary ordered decoration of the test's actions, applied together
/// with all other decorators of the scope.
#[derive(Clone)]
pub struct DecoratorPattern {
    order: i32,
    decorate: Decoration,
}

impl DecoratorPattern {
    pub fn new(order: i32, decorate: impl Fn(&mut TestActions) + Send + Sync + 'static) -> Self {
        DecoratorPattern {
            order,
            decorate: Arc::new(decorate),
        }
    }
}

impl std::fmt::Debug for DecoratorPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorPattern")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl Pattern for DecoratorPattern {
    fn name(&self) -> &str {
        "Decorator"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        _element: CodeElement,
    ) -> PatternResult {
        let decorate = Arc::clone(&self.decorate);
        evaluator.add_decorator(scope, self.order, move |ev, scope| {
            decorate(&mut ev.test_mut(scope).actions);
            Ok(())
        })
    }
}

/// Turns an expected failure of the execute phase into another outcome.
///
/// A failure whose message contains `expected` (any failure when unset) is
/// reported as `outcome` instead; `TestOutcome::Passed` swallows it. Other
/// failures pass through unchanged.
#[derive(Clone, Debug)]
pub struct CatchFailurePattern {
    expected: Option<String>,
    outcome: TestOutcome,
    order: i32,
}

impl CatchFailurePattern {
    pub fn new(outcome: TestOutcome) -> Self {
        CatchFailurePattern {
            expected: None,
            outcome,
            order: 0,
        }
    }

    #[must_use]
    pub fn matching(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Pattern for CatchFailurePattern {
    fn name(&self) -> &str {
        "CatchFailure"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        _element: CodeElement,
    ) -> PatternResult {
        let expected = self.expected.clone();
        let outcome = self.outcome;
        evaluator.add_decorator(scope, self.order, move |ev, scope| {
            ev.test_mut(scope)
                .actions
                .instance
                .execute
                .around(move |state, inner| match inner(state) {
                    Err(failure)
                        if expected
                            .as_deref()
                            .map_or(true, |text| failure.message.contains(text)) =>
                    {
                        if outcome.is_passed() {
                            Ok(())
                        } else {
                            Err(TestFailure::new(outcome, failure.message))
                        }
                    }
                    other => other,
                });
            Ok(())
        })
    }
}

/// Several patterns acting as one. Primary if any part is; the first
/// primary part consumes, every part processes.
#[derive(Clone, Default)]
pub struct CompositePattern {
    parts: Vec<SharedPattern>,
}

impl CompositePattern {
    pub fn new(parts: Vec<SharedPattern>) -> Self {
        CompositePattern { parts }
    }

    #[must_use]
    pub fn with(mut self, part: impl Pattern + 'static) -> Self {
        self.parts.push(Arc::new(part));
        self
    }

    fn primary(&self) -> Option<&SharedPattern> {
        self.parts.iter().find(|part| part.is_primary())
    }
}

impl std::fmt::Debug for CompositePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.parts.iter().map(|part| part.name()))
            .finish()
    }
}

impl Pattern for CompositePattern {
    fn name(&self) -> &str {
        "Composite"
    }

    fn is_primary(&self) -> bool {
        self.primary().is_some()
    }

    fn test_parts(&self, evaluator: &Evaluator, element: CodeElement) -> TestParts {
        self.parts
            .iter()
            .fold(TestParts::empty(), |parts, part| parts | part.test_parts(evaluator, element))
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        element: CodeElement,
        skip_children: bool,
    ) -> PatternResult {
        let primaries = self.parts.iter().filter(|part| part.is_primary()).count();
        if primaries > 1 {
            let code = evaluator.code();
            return Err(PatternError::usage(format!(
                "a composite pattern on {} '{}' combines {primaries} primary patterns; \
                 at most one primary pattern may apply to a code element",
                code.kind(element),
                code.full_name(element)
            )));
        }
        match self.primary() {
            Some(primary) => primary.consume(evaluator, containing, element, skip_children),
            None => Ok(()),
        }
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        for part in &self.parts {
            part.process(evaluator, scope, element)?;
        }
        Ok(())
    }
}
