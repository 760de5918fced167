//! Built-in patterns.
//!
//! Primary patterns (`AssemblyPattern`, `FixturePattern`, `TestMethodPattern`,
//! `ParameterPattern` and the lifecycle method patterns) declare structure.
//! The rest decorate whatever scope their element's primary created.

mod attributes;
mod container;
mod data;
mod decorate;
mod dependency;
mod lifecycle;
mod method;
mod parameter;

pub use attributes::{
    ExplicitPattern, IgnorePattern, MetadataPattern, OrderPattern, ParallelizablePattern,
    TimeoutPattern,
};
pub use container::{AssemblyPattern, AutoFixturePattern, FixturePattern};
pub use data::{DataSourcePattern, RowPattern};
pub use decorate::{CatchFailurePattern, CompositePattern, DecoratorPattern};
pub use dependency::DependsOnPattern;
pub use lifecycle::{LifecyclePhase, LifecycleMethodPattern};
pub use method::TestMethodPattern;
pub use parameter::{BindPattern, ParameterPattern};

use galena_ir::{CodeElement, CodeModel, ElementBody, MethodInvoker};

use crate::PatternError;

/// Invoker registered for `method`, or a usage error naming `role`.
pub(crate) fn method_invoker(
    code: &dyn CodeModel,
    method: CodeElement,
    role: &str,
) -> Result<MethodInvoker, PatternError> {
    match code.body(method) {
        Some(ElementBody::Method(invoker)) => Ok(invoker.clone()),
        _ => Err(PatternError::usage(format!(
            "{role} '{}' has no method body registered",
            code.full_name(method)
        ))),
    }
}

#[cfg(test)]
mod tests;
