//! Galena IR - shared vocabulary for the Galena test framework.
//!
//! This crate provides:
//! - Code element handles (`CodeElement`) and the read-only `CodeModel` interface
//! - An in-memory registration table (`CodeCatalog`) standing in for reflection
//! - Runtime data values (`Value`, `ValueType`) bound into test slots
//! - The outcome lattice (`TestOutcome`) and user-code failures (`TestFailure`)
//! - Arena ids for tests, parameters and data contexts
//!
//! # Code Elements
//!
//! A code element is an opaque `u32` handle into a code model. Identity is by
//! declaration site: two handles are equal iff they name the same declaration.
//! Executable hooks (fixture factories, method invokers, field setters) are
//! supplied by the host through `ElementBody` so that the runtime never needs
//! language-level reflection.

mod catalog;
mod element;
mod ids;
mod outcome;
mod panic;
mod value;

pub use catalog::{CatalogBuilder, CodeCatalog};
pub use element::{
    CodeElement, CodeElementKind, CodeModel, ElementBody, Fixture, FixtureFactory, MethodInvoker,
    SlotSetter,
};
pub use ids::{DataContextId, ParameterId, TestId};
pub use outcome::{PhaseResult, TestFailure, TestOutcome};
pub use panic::panic_message;
pub use value::{Value, ValueType};
