//! The `Pattern` trait and its supporting types.

use std::sync::Arc;

use bitflags::bitflags;

use galena_ir::CodeElement;

use crate::{Evaluator, ScopeId};

bitflags! {
    /// What a primary pattern contributes for an element, as seen by
    /// `Evaluator::test_parts` before the element is consumed.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TestParts: u8 {
        /// Declares a test.
        const TEST = 1 << 0;
        /// Declares a test that may hold child tests.
        const TEST_CONTAINER = 1 << 1;
        /// Declares a test parameter.
        const PARAMETER = 1 << 2;
        /// Contributes behaviour to an enclosing test.
        const CONTRIBUTION = 1 << 3;
    }
}

/// A pattern failure, reported as an annotation on the element being
/// evaluated. Evaluation of siblings continues.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// The pattern was applied somewhere it does not make sense.
    #[error("{0}")]
    Usage(String),
    /// A decorator arrived after the scope applied its decorators.
    #[error("cannot add a decorator to a scope whose decorators have already been applied")]
    Finalized,
    /// A dependency names an element that produced no test.
    #[error("{0}")]
    NotATest(String),
    /// Any other failure; the payload becomes the annotation detail.
    #[error("{0}")]
    Unexpected(String),
}

impl PatternError {
    pub fn usage(message: impl Into<String>) -> Self {
        PatternError::Usage(message.into())
    }

    pub fn unexpected(detail: impl Into<String>) -> Self {
        PatternError::Unexpected(detail.into())
    }
}

pub type PatternResult = Result<(), PatternError>;

/// A declarative unit attached to a code element.
///
/// Exactly one primary pattern may claim an element through `consume`; every
/// pattern on the element (primary or not) then gets `process` against the
/// scope the primary created.
pub trait Pattern: Send + Sync {
    fn name(&self) -> &str;

    fn is_primary(&self) -> bool {
        false
    }

    fn test_parts(&self, _evaluator: &Evaluator, _element: CodeElement) -> TestParts {
        TestParts::empty()
    }

    /// Claim `element` inside `containing`, usually by creating a scope for it.
    /// With `skip_children` set, test-declaring children should be registered
    /// for deferred population rather than consumed now.
    fn consume(
        &self,
        _evaluator: &mut Evaluator,
        _containing: ScopeId,
        _element: CodeElement,
        _skip_children: bool,
    ) -> PatternResult {
        Ok(())
    }

    /// Apply this pattern's contribution to `scope`.
    fn process(
        &self,
        _evaluator: &mut Evaluator,
        _scope: ScopeId,
        _element: CodeElement,
    ) -> PatternResult {
        Ok(())
    }
}

pub type SharedPattern = Arc<dyn Pattern>;
