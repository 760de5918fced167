//! Galena Patterns - turning a code model into a test model.
//!
//! Declarative patterns are attached to code elements through a
//! `PatternResolver`. The `Evaluator` walks the code model under the control
//! of those patterns and builds a `TestModel`:
//!
//! - a *primary* pattern consumes an element and usually creates a scope
//!   (a test, a parameter, or a contribution to the enclosing test);
//! - every pattern on the element then processes that scope;
//! - decorators queued on a scope apply in order once the scope's own
//!   children have been scheduled.
//!
//! Pattern failures never abort evaluation. They become annotations on the
//! offending element and evaluation continues with its siblings.
//!
//! # Deferred population
//!
//! With `skip_children` set, test-declaring children are registered on their
//! parent scope and built only when `Evaluator::populate` asks for them.

pub mod builtins;
mod evaluator;
mod pattern;
mod resolver;

pub use evaluator::{ChildPopulator, Evaluator, Scope, ScopeId};
pub use pattern::{Pattern, PatternError, PatternResult, SharedPattern, TestParts};
pub use resolver::{PatternResolver, PatternTable};
