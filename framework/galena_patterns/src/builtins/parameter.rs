use galena_ir::CodeElement;
use galena_model::DataBinder;

use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId, TestParts};

/// Declares a slot (method or constructor parameter, generic parameter,
/// field or property) as a test parameter.
///
/// The parameter's data context gets an implicit binding offset equal to
/// the slot's position, so the n-th parameter reads column n of the nearest
/// anonymous data source by default.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParameterPattern;

impl Pattern for ParameterPattern {
    fn name(&self) -> &str {
        "Parameter"
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::PARAMETER
    }

    fn consume(
        &self,
        evaluator: &mut Evaluator,
        containing: ScopeId,
        slot: CodeElement,
        _skip_children: bool,
    ) -> PatternResult {
        let code = evaluator.code();
        if !code.kind(slot).is_slot() {
            return Err(PatternError::usage(format!(
                "the parameter pattern applies to slots, not to {} '{}'",
                code.kind(slot),
                code.full_name(slot)
            )));
        }
        let scope = evaluator.create_parameter_scope(containing, slot, code.name(slot));
        evaluator.data_context_mut(scope).implicit_data_binding_index_offset =
            code.position(slot) as usize;
        evaluator.process_element(scope, slot);
        evaluator.schedule_apply_decorators(scope);
        Ok(())
    }
}

/// Overrides how a parameter is bound: which source, which column or path.
/// Unset parts of the binder keep their current value.
#[derive(Clone, Debug, Default)]
pub struct BindPattern {
    binder: DataBinder,
}

impl BindPattern {
    pub fn new(binder: DataBinder) -> Self {
        BindPattern { binder }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::new(DataBinder::implicit().with_source(name))
    }

    pub fn index(index: usize) -> Self {
        Self::new(DataBinder::implicit().with_index(index))
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(DataBinder::implicit().with_path(path))
    }
}

impl Pattern for BindPattern {
    fn name(&self) -> &str {
        "Bind"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        let Some(parameter) = evaluator.parameter_mut(scope) else {
            let code = evaluator.code();
            return Err(PatternError::usage(format!(
                "the bind pattern applies to test parameters, but {} '{}' is not one",
                code.kind(element),
                code.full_name(element)
            )));
        };
        let binder = &mut parameter.binder;
        if self.binder.source.is_some() {
            binder.source.clone_from(&self.binder.source);
        }
        if self.binder.index.is_some() {
            binder.index = self.binder.index;
        }
        if self.binder.path.is_some() {
            binder.path.clone_from(&self.binder.path);
        }
        Ok(())
    }
}
