//! Hook bundles attached to every test.

use crate::chain::{ActionChain, DecoratorChain};
use crate::{TestInstanceState, TestState};

/// Test-level hooks.
///
/// Cloning is cheap (every chain is `Arc`-backed). The engine runs a clone
/// so that per-run decorations never reach the model.
#[derive(Clone, Debug, Default)]
pub struct TestActions {
    /// Runs once before any instance; binding accessors are registered first.
    pub before_test: ActionChain<TestState>,
    pub initialize_test: ActionChain<TestState>,
    /// Finalizer paired with `initialize_test`.
    pub dispose_test: ActionChain<TestState>,
    /// Runs once after all instances, even if they failed.
    pub after_test: ActionChain<TestState>,
    /// Decorates a fresh copy of `instance` for each data item.
    pub decorate_test_instance: DecoratorChain<TestState, TestInstanceActions>,
    pub instance: TestInstanceActions,
}

/// Per-instance hooks.
#[derive(Clone, Debug, Default)]
pub struct TestInstanceActions {
    pub before_instance: ActionChain<TestInstanceState>,
    pub initialize: ActionChain<TestInstanceState>,
    pub set_up: ActionChain<TestInstanceState>,
    pub execute: ActionChain<TestInstanceState>,
    pub tear_down: ActionChain<TestInstanceState>,
    pub dispose: ActionChain<TestInstanceState>,
    pub after_instance: ActionChain<TestInstanceState>,
    /// Decorates a child test's actions before the child runs; the decorated
    /// copy is dropped when the child completes.
    pub decorate_child_test: DecoratorChain<TestInstanceState, TestActions>,
}
