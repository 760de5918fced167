use std::sync::Arc;

use galena_ir::{CodeElement, CodeElementKind, TestFailure};
use galena_model::TestKind;

use crate::builtins::{method_invoker, ParameterPattern};
use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId, SharedPattern, TestParts};

/// Declares a method as a test case. Method parameters become test
/// parameters; each instance invokes the method with the bound arguments on
/// the fixture handed down by the enclosing fixture.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestMethodPattern;

impl Pattern for TestMethodPattern {
    fn name(&self) -> &str {
        "Test"
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::TEST
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        method: CodeElement,
        _skip_children: bool,
    ) -> PatternResult {
        let code = evaluator.code();
        if code.kind(method) != CodeElementKind::Method {
            return Err(PatternError::usage(format!(
                "the test pattern applies to methods, not to {} '{}'",
                code.kind(method),
                code.full_name(method)
            )));
        }
        let invoker = method_invoker(&*code, method, "test method")?;

        let scope = evaluator.create_test_scope(
            containing,
            Some(method),
            code.name(method),
            TestKind::Test,
        );
        evaluator.test_mut(scope).is_test_case = true;
        evaluator.process_element(scope, method);

        let params = code.children_of_kind(method, CodeElementKind::Parameter);
        let parameter: SharedPattern = Arc::new(ParameterPattern);
        for &slot in &params {
            evaluator.consume_child(scope, slot, false, Some(Arc::clone(&parameter)));
        }

        let method_name = code.full_name(method);
        let instance = &mut evaluator.test_mut(scope).actions.instance;
        instance.initialize.after(move |state| {
            state.test_method = Some(method);
            state.arguments = params
                .iter()
                .map(|slot| {
                    state.slot_value(*slot).cloned().ok_or_else(|| {
                        TestFailure::error(format!(
                            "no value bound for a parameter of '{method_name}'"
                        ))
                    })
                })
                .collect::<Result<_, _>>()?;
            Ok(())
        });
        instance
            .execute
            .after(move |state| invoker(state.fixture.as_ref(), &state.arguments));

        evaluator.schedule_apply_decorators(scope);
        Ok(())
    }
}
