//! Assembly and fixture patterns.

use std::sync::Arc;

use galena_ir::{
    CodeElement, CodeElementKind, ElementBody, FixtureFactory, SlotSetter, TestFailure,
};
use galena_model::TestKind;

use crate::builtins::ParameterPattern;
use crate::{Evaluator, Pattern, PatternResult, ScopeId, SharedPattern, TestParts};

/// Default primary for assemblies: one test per assembly, one fixture per
/// concrete type that contains tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssemblyPattern;

impl Pattern for AssemblyPattern {
    fn name(&self) -> &str {
        "Assembly"
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::TEST | TestParts::TEST_CONTAINER
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        assembly: CodeElement,
        skip_children: bool,
    ) -> PatternResult {
        let code = evaluator.code();
        let scope = evaluator.create_test_scope(
            containing,
            Some(assembly),
            code.name(assembly),
            TestKind::Assembly,
        );
        evaluator.process_element(scope, assembly);

        let types = code.children_of_kind(assembly, CodeElementKind::Type);
        if skip_children {
            evaluator.add_deferred_populator(scope, types, |ev, scope, ty| {
                ev.consume_child(scope, ty, false, Some(auto_fixture()));
                Ok(())
            });
        } else {
            for ty in types {
                evaluator.consume_child(scope, ty, false, Some(auto_fixture()));
            }
        }
        evaluator.schedule_apply_decorators(scope);
        Ok(())
    }
}

fn auto_fixture() -> SharedPattern {
    Arc::new(AutoFixturePattern)
}

/// Explicit fixture declaration.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixturePattern;

impl Pattern for FixturePattern {
    fn name(&self) -> &str {
        "Fixture"
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::TEST | TestParts::TEST_CONTAINER
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        ty: CodeElement,
        skip_children: bool,
    ) -> PatternResult {
        consume_fixture(evaluator, containing, ty, skip_children);
        Ok(())
    }
}

/// Default primary for types: a fixture if the type is concrete and holds at
/// least one test, otherwise nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoFixturePattern;

impl AutoFixturePattern {
    fn holds_tests(evaluator: &Evaluator, ty: CodeElement) -> bool {
        let code = evaluator.code();
        if code.kind(ty) != CodeElementKind::Type || code.is_abstract(ty) {
            return false;
        }
        let nested = auto_fixture();
        code.children(ty).iter().any(|&member| match code.kind(member) {
            CodeElementKind::Method => evaluator.is_test(member, None),
            CodeElementKind::Type => evaluator.is_test(member, Some(&nested)),
            _ => false,
        })
    }
}

impl Pattern for AutoFixturePattern {
    fn name(&self) -> &str {
        "AutoFixture"
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, evaluator: &Evaluator, ty: CodeElement) -> TestParts {
        if Self::holds_tests(evaluator, ty) {
            TestParts::TEST | TestParts::TEST_CONTAINER
        } else {
            TestParts::empty()
        }
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        ty: CodeElement,
        skip_children: bool,
    ) -> PatternResult {
        if Self::holds_tests(evaluator, ty) {
            consume_fixture(evaluator, containing, ty, skip_children);
        }
        Ok(())
    }
}

/// Build the fixture test for `ty`: constructor and generic parameters,
/// field and property parameters, member tests and the fixture lifecycle.
fn consume_fixture(
    evaluator: &mut Evaluator,
    containing: ScopeId,
    ty: CodeElement,
    skip_children: bool,
) {
    let code = evaluator.code();
    let scope = evaluator.create_test_scope(containing, Some(ty), code.name(ty), TestKind::Fixture);
    evaluator.process_element(scope, ty);

    let constructor = code
        .children_of_kind(ty, CodeElementKind::Constructor)
        .first()
        .copied();
    let constructor_params = constructor
        .map(|c| code.children_of_kind(c, CodeElementKind::Parameter))
        .unwrap_or_default();
    let parameter: SharedPattern = Arc::new(ParameterPattern);
    for &slot in constructor_params
        .iter()
        .chain(&code.children_of_kind(ty, CodeElementKind::GenericParameter))
    {
        evaluator.consume_child(scope, slot, false, Some(Arc::clone(&parameter)));
    }

    let nested = auto_fixture();
    let mut deferred = Vec::new();
    let mut setters: Vec<(CodeElement, SlotSetter)> = Vec::new();
    for &member in code.children(ty) {
        match code.kind(member) {
            CodeElementKind::Field | CodeElementKind::Property => {
                if let Some(ElementBody::Setter(setter)) = code.body(member) {
                    setters.push((member, setter.clone()));
                }
                evaluator.consume_child(scope, member, false, None);
            }
            CodeElementKind::Method => {
                if skip_children && evaluator.is_test(member, None) {
                    deferred.push(member);
                } else {
                    evaluator.consume_child(scope, member, false, None);
                }
            }
            CodeElementKind::Type => {
                if skip_children && evaluator.is_test(member, Some(&nested)) {
                    deferred.push(member);
                } else {
                    evaluator.consume_child(
                        scope,
                        member,
                        skip_children,
                        Some(Arc::clone(&nested)),
                    );
                }
            }
            _ => {}
        }
    }
    if !deferred.is_empty() {
        evaluator.add_deferred_populator(scope, deferred, |ev, scope, member| {
            let default = match ev.code().kind(member) {
                CodeElementKind::Type => Some(auto_fixture()),
                _ => None,
            };
            ev.consume_child(scope, member, false, default);
            Ok(())
        });
    }

    let factory: Option<FixtureFactory> = constructor.and_then(|c| match code.body(c) {
        Some(ElementBody::Constructor(factory)) => Some(factory.clone()),
        _ => None,
    });
    let type_name = code.full_name(ty);
    let actions = &mut evaluator.test_mut(scope).actions;
    actions.instance.initialize.after(move |state| {
        // An instance handed down by an enclosing fixture of another type
        // is replaced, never reused.
        let inherited = state.fixture_type == Some(ty) && state.fixture.is_some();
        if !inherited {
            state.fixture_type = Some(ty);
            state.fixture = match &factory {
                Some(factory) => {
                    let args = constructor_params
                        .iter()
                        .map(|slot| {
                            state.slot_value(*slot).cloned().ok_or_else(|| {
                                TestFailure::error(format!(
                                    "no value bound for a constructor parameter of '{type_name}'"
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Some(factory(&args)?)
                }
                None => None,
            };
        }
        if let Some(fixture) = state.fixture.clone() {
            for (slot, setter) in &setters {
                if let Some(value) = state.slot_value(*slot).cloned() {
                    setter(&fixture, value)?;
                }
            }
        }
        Ok(())
    });
    actions.instance.dispose.after(|state| {
        state.fixture = None;
        Ok(())
    });
    actions.instance.decorate_child_test.after(|parent, child| {
        let fixture = parent.fixture.clone();
        let fixture_type = parent.fixture_type;
        child.instance.before_instance.before(move |state| {
            state.fixture.clone_from(&fixture);
            state.fixture_type = fixture_type;
            Ok(())
        });
        Ok(())
    });
    evaluator.schedule_apply_decorators(scope);
}
