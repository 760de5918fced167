use galena_ir::CodeElement;

use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId};

/// Makes the test depend on every test declared by another element.
///
/// Resolved once evaluation is finished so the target may be declared
/// anywhere, including in a deferred part of the tree.
#[derive(Clone, Copy, Debug)]
pub struct DependsOnPattern {
    target: CodeElement,
}

impl DependsOnPattern {
    pub fn new(target: CodeElement) -> Self {
        DependsOnPattern { target }
    }
}

impl Pattern for DependsOnPattern {
    fn name(&self) -> &str {
        "DependsOn"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        let test = evaluator.scope(scope).test;
        let target = self.target;
        evaluator.add_finish_action(element, move |ev| {
            ev.populate_element(target);
            let targets = ev.model().tests_for_element(target).to_vec();
            if targets.is_empty() {
                let code = ev.code();
                return Err(PatternError::NotATest(format!(
                    "'{}' depends on '{}', which does not declare a test",
                    code.full_name(element),
                    code.full_name(target)
                )));
            }
            for on in targets {
                ev.model_mut().add_dependency(test, on);
            }
            Ok(())
        });
        Ok(())
    }
}
