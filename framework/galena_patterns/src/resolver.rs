//! Pattern lookup by code element.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use galena_ir::CodeElement;

use crate::{Pattern, SharedPattern};

/// Yields the patterns attached to an element, in declaration order.
pub trait PatternResolver: Send + Sync {
    fn patterns(&self, element: CodeElement) -> &[SharedPattern];
}

/// Explicit element-to-patterns table filled in by the host.
#[derive(Default)]
pub struct PatternTable {
    map: FxHashMap<CodeElement, Vec<SharedPattern>>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, element: CodeElement, pattern: impl Pattern + 'static) -> &mut Self {
        self.attach_shared(element, Arc::new(pattern))
    }

    pub fn attach_shared(&mut self, element: CodeElement, pattern: SharedPattern) -> &mut Self {
        self.map.entry(element).or_default().push(pattern);
        self
    }

    /// Number of elements carrying at least one pattern.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl PatternResolver for PatternTable {
    fn patterns(&self, element: CodeElement) -> &[SharedPattern] {
        self.map.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl std::fmt::Debug for PatternTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternTable")
            .field("elements", &self.map.len())
            .finish()
    }
}
