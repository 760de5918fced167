use galena_ir::{CodeElement, CodeElementKind};
use galena_model::TestKind;

use crate::builtins::method_invoker;
use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId, TestParts};

/// Where a lifecycle method plugs into its fixture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Before each child test instance, after the child's own set-up chain
    /// was built. Several set-ups run in declaration order.
    SetUp,
    /// After each child test instance. Several tear-downs run in
    /// declaration order.
    TearDown,
    /// Once per fixture instance, before its children.
    FixtureSetUp,
    /// Once per fixture instance, after its children.
    FixtureTearDown,
}

impl LifecyclePhase {
    fn label(self) -> &'static str {
        match self {
            LifecyclePhase::SetUp => "set-up",
            LifecyclePhase::TearDown => "tear-down",
            LifecyclePhase::FixtureSetUp => "fixture set-up",
            LifecyclePhase::FixtureTearDown => "fixture tear-down",
        }
    }
}

/// Declares a fixture method as a lifecycle hook rather than a test.
#[derive(Clone, Copy, Debug)]
pub struct LifecycleMethodPattern {
    phase: LifecyclePhase,
}

impl LifecycleMethodPattern {
    pub fn new(phase: LifecyclePhase) -> Self {
        LifecycleMethodPattern { phase }
    }

    pub fn set_up() -> Self {
        Self::new(LifecyclePhase::SetUp)
    }

    pub fn tear_down() -> Self {
        Self::new(LifecyclePhase::TearDown)
    }

    pub fn fixture_set_up() -> Self {
        Self::new(LifecyclePhase::FixtureSetUp)
    }

    pub fn fixture_tear_down() -> Self {
        Self::new(LifecyclePhase::FixtureTearDown)
    }
}

impl Pattern for LifecycleMethodPattern {
    fn name(&self) -> &str {
        self.phase.label()
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::CONTRIBUTION
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        method: CodeElement,
        _skip_children: bool,
    ) -> PatternResult {
        let code = evaluator.code();
        let label = self.phase.label();
        if code.kind(method) != CodeElementKind::Method {
            return Err(PatternError::usage(format!(
                "a {label} hook must be a method, not {} '{}'",
                code.kind(method),
                code.full_name(method)
            )));
        }
        if evaluator.test(containing).kind != TestKind::Fixture {
            return Err(PatternError::usage(format!(
                "{label} method '{}' must be declared inside a fixture",
                code.full_name(method)
            )));
        }
        let invoker = method_invoker(&*code, method, label)?;

        let phase = self.phase;
        evaluator.add_decorator(containing, 0, move |ev, scope| {
            let instance = &mut ev.test_mut(scope).actions.instance;
            match phase {
                // Prepending to the decorator chain keeps declaration order:
                // the last set-up decorates first and ends up innermost.
                LifecyclePhase::SetUp => instance.decorate_child_test.before(move |_, child| {
                    let invoker = invoker.clone();
                    child
                        .instance
                        .set_up
                        .before(move |state| invoker(state.fixture.as_ref(), &[]));
                    Ok(())
                }),
                LifecyclePhase::TearDown => instance.decorate_child_test.after(move |_, child| {
                    let invoker = invoker.clone();
                    child
                        .instance
                        .tear_down
                        .after(move |state| invoker(state.fixture.as_ref(), &[]));
                    Ok(())
                }),
                LifecyclePhase::FixtureSetUp => instance
                    .set_up
                    .after(move |state| invoker(state.fixture.as_ref(), &[])),
                LifecyclePhase::FixtureTearDown => instance
                    .tear_down
                    .after(move |state| invoker(state.fixture.as_ref(), &[])),
            }
            Ok(())
        })
    }
}
