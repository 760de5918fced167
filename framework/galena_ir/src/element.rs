//! Code element handles and the metadata interface.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{PhaseResult, TestFailure, Value, ValueType};

/// Handle to a declaration in a code model.
///
/// 4 bytes, `Copy`, O(1) equality. Used as the key for pattern lookup and
/// for attaching annotations.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct CodeElement(u32);

impl CodeElement {
    /// Create a handle from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        CodeElement(index)
    }

    /// Get the index into the owning model.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CodeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeElement({})", self.0)
    }
}

/// Kind of declaration a code element refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeElementKind {
    Assembly,
    Type,
    Constructor,
    Method,
    Field,
    Property,
    Parameter,
    GenericParameter,
}

impl CodeElementKind {
    /// Whether elements of this kind can be bound to a data value.
    pub fn is_slot(self) -> bool {
        matches!(
            self,
            CodeElementKind::Field
                | CodeElementKind::Property
                | CodeElementKind::Parameter
                | CodeElementKind::GenericParameter
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            CodeElementKind::Assembly => "assembly",
            CodeElementKind::Type => "type",
            CodeElementKind::Constructor => "constructor",
            CodeElementKind::Method => "method",
            CodeElementKind::Field => "field",
            CodeElementKind::Property => "property",
            CodeElementKind::Parameter => "parameter",
            CodeElementKind::GenericParameter => "generic parameter",
        }
    }
}

impl fmt::Display for CodeElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A live fixture object, shared between a fixture and its child tests.
pub type Fixture = Arc<dyn Any + Send + Sync>;

/// Creates a fixture from bound constructor arguments.
pub type FixtureFactory = Arc<dyn Fn(&[Value]) -> Result<Fixture, TestFailure> + Send + Sync>;

/// Invokes a method on an optional fixture with bound arguments.
pub type MethodInvoker = Arc<dyn Fn(Option<&Fixture>, &[Value]) -> PhaseResult + Send + Sync>;

/// Stores a bound value into a field or property of a fixture.
pub type SlotSetter = Arc<dyn Fn(&Fixture, Value) -> PhaseResult + Send + Sync>;

/// Executable hook attached to a declaration.
///
/// Hosts without runtime reflection register these alongside the metadata so
/// that patterns can wire them into action chains.
#[derive(Clone)]
pub enum ElementBody {
    Constructor(FixtureFactory),
    Method(MethodInvoker),
    Setter(SlotSetter),
}

impl fmt::Debug for ElementBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementBody::Constructor(_) => f.write_str("Constructor(..)"),
            ElementBody::Method(_) => f.write_str("Method(..)"),
            ElementBody::Setter(_) => f.write_str("Setter(..)"),
        }
    }
}

/// Read-only view over program metadata.
///
/// Implemented by [`CodeCatalog`](crate::CodeCatalog); hosts with their own
/// metadata store may implement it directly.
pub trait CodeModel: Send + Sync {
    fn kind(&self, element: CodeElement) -> CodeElementKind;

    fn name(&self, element: CodeElement) -> &str;

    fn parent(&self, element: CodeElement) -> Option<CodeElement>;

    /// Declared children in declaration order.
    fn children(&self, element: CodeElement) -> &[CodeElement];

    /// Value type of a slot element; `ValueType::Any` for non-slots.
    fn value_type(&self, element: CodeElement) -> ValueType;

    /// Zero-based position among the siblings of the same kind.
    fn position(&self, element: CodeElement) -> u32;

    fn is_abstract(&self, element: CodeElement) -> bool;

    fn documentation(&self, element: CodeElement) -> Option<&str>;

    fn body(&self, element: CodeElement) -> Option<&ElementBody>;

    /// Dotted path from the outermost container, assemblies excluded.
    fn full_name(&self, element: CodeElement) -> String {
        let mut parts = vec![self.name(element)];
        let mut cursor = self.parent(element);
        while let Some(parent) = cursor {
            if self.kind(parent) == CodeElementKind::Assembly {
                break;
            }
            parts.push(self.name(parent));
            cursor = self.parent(parent);
        }
        parts.reverse();
        parts.join(".")
    }

    /// Children of `element` with the given kind.
    fn children_of_kind(&self, element: CodeElement, kind: CodeElementKind) -> Vec<CodeElement> {
        self.children(element)
            .iter()
            .copied()
            .filter(|child| self.kind(*child) == kind)
            .collect()
    }
}
