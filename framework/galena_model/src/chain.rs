//! Action chains.
//!
//! An action chain is the composed behaviour of one lifecycle hook. Composing
//! never runs anything: `before`, `after` and `around` only wrap the current
//! action in a new closure. Chains are `Arc`-backed, so cloning one is cheap
//! and a clone can be decorated without touching the original.
//!
//! ```text
//! chain.before(a)   =>  a ; chain
//! chain.after(b)    =>  chain ; b
//! chain.around(w)   =>  w(chain)
//! ```
//!
//! A failing action short-circuits the rest of the chain, the same way `?`
//! does.

use std::fmt;
use std::sync::Arc;

use galena_ir::PhaseResult;

/// One composed action over a state.
pub type Action<T> = Arc<dyn Fn(&mut T) -> PhaseResult + Send + Sync>;

/// Two-argument action, used by the `decorate_*` hooks.
pub type Action2<P, C> = Arc<dyn Fn(&mut P, &mut C) -> PhaseResult + Send + Sync>;

fn no_op<T>(_: &mut T) -> PhaseResult {
    Ok(())
}

/// Ordered composition of actions for one phase.
pub struct ActionChain<T> {
    action: Option<Action<T>>,
    len: usize,
}

impl<T: 'static> ActionChain<T> {
    pub fn new() -> Self {
        ActionChain {
            action: None,
            len: 0,
        }
    }

    /// Number of actions composed so far (a `set` counts as one).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }

    /// Run `f` before the current chain.
    pub fn before(&mut self, f: impl Fn(&mut T) -> PhaseResult + Send + Sync + 'static) {
        let first: Action<T> = Arc::new(f);
        self.action = Some(match self.action.take() {
            None => first,
            Some(rest) => {
                let composed: Action<T> = Arc::new(move |state: &mut T| {
                    first(state)?;
                    rest(state)
                });
                composed
            }
        });
        self.len += 1;
    }

    /// Run `f` after the current chain.
    pub fn after(&mut self, f: impl Fn(&mut T) -> PhaseResult + Send + Sync + 'static) {
        let last: Action<T> = Arc::new(f);
        self.action = Some(match self.action.take() {
            None => last,
            Some(rest) => {
                let composed: Action<T> = Arc::new(move |state: &mut T| {
                    rest(state)?;
                    last(state)
                });
                composed
            }
        });
        self.len += 1;
    }

    /// Wrap the current chain. `f` receives the inner chain and decides
    /// whether, and how, to run it.
    pub fn around(
        &mut self,
        f: impl Fn(&mut T, &dyn Fn(&mut T) -> PhaseResult) -> PhaseResult + Send + Sync + 'static,
    ) {
        let inner = self.action.take();
        let wrapped: Action<T> = Arc::new(move |state: &mut T| match &inner {
            Some(inner) => f(state, &**inner),
            None => f(state, &no_op::<T>),
        });
        self.action = Some(wrapped);
        self.len += 1;
    }

    /// Replace the whole chain with `f`.
    pub fn set(&mut self, f: impl Fn(&mut T) -> PhaseResult + Send + Sync + 'static) {
        let action: Action<T> = Arc::new(f);
        self.action = Some(action);
        self.len = 1;
    }

    pub fn clear(&mut self) {
        self.action = None;
        self.len = 0;
    }

    /// Run the composed chain.
    pub fn call(&self, state: &mut T) -> PhaseResult {
        match &self.action {
            Some(action) => action(state),
            None => Ok(()),
        }
    }
}

impl<T: 'static> Default for ActionChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ActionChain<T> {
    fn clone(&self) -> Self {
        ActionChain {
            action: self.action.clone(),
            len: self.len,
        }
    }
}

impl<T> fmt::Debug for ActionChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionChain({})", self.len)
    }
}

/// Action chain over a pair of arguments.
///
/// Used for hooks that decorate another bundle: the first argument is the
/// state of the decorating test, the second the bundle being decorated.
pub struct DecoratorChain<P, C> {
    action: Option<Action2<P, C>>,
    len: usize,
}

impl<P: 'static, C: 'static> DecoratorChain<P, C> {
    pub fn new() -> Self {
        DecoratorChain {
            action: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }

    pub fn before(&mut self, f: impl Fn(&mut P, &mut C) -> PhaseResult + Send + Sync + 'static) {
        let first: Action2<P, C> = Arc::new(f);
        self.action = Some(match self.action.take() {
            None => first,
            Some(rest) => {
                let composed: Action2<P, C> = Arc::new(move |parent: &mut P, child: &mut C| {
                    first(parent, child)?;
                    rest(parent, child)
                });
                composed
            }
        });
        self.len += 1;
    }

    pub fn after(&mut self, f: impl Fn(&mut P, &mut C) -> PhaseResult + Send + Sync + 'static) {
        let last: Action2<P, C> = Arc::new(f);
        self.action = Some(match self.action.take() {
            None => last,
            Some(rest) => {
                let composed: Action2<P, C> = Arc::new(move |parent: &mut P, child: &mut C| {
                    rest(parent, child)?;
                    last(parent, child)
                });
                composed
            }
        });
        self.len += 1;
    }

    pub fn set(&mut self, f: impl Fn(&mut P, &mut C) -> PhaseResult + Send + Sync + 'static) {
        let action: Action2<P, C> = Arc::new(f);
        self.action = Some(action);
        self.len = 1;
    }

    pub fn clear(&mut self) {
        self.action = None;
        self.len = 0;
    }

    pub fn call(&self, parent: &mut P, child: &mut C) -> PhaseResult {
        match &self.action {
            Some(action) => action(parent, child),
            None => Ok(()),
        }
    }
}

impl<P: 'static, C: 'static> Default for DecoratorChain<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> Clone for DecoratorChain<P, C> {
    fn clone(&self) -> Self {
        DecoratorChain {
            action: self.action.clone(),
            len: self.len,
        }
    }
}

impl<P, C> fmt::Debug for DecoratorChain<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecoratorChain({})", self.len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
