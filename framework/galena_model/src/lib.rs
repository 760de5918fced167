//! Galena Model - the test tree and everything that runs through it.
//!
//! This crate provides:
//! - `ActionChain` / `DecoratorChain`: composable behaviour for one lifecycle hook
//! - `TestActions` / `TestInstanceActions`: the per-test and per-instance hook bundles
//! - `TestModel`: arena of tests, parameters and nested data contexts
//! - Data binding (`DataBinder`, `DataBindingContext`, `DataBindingItem`)
//! - Run-time records (`TestState`, `TestInstanceState`) and the `AbortSignal`
//! - Value conversion and formatting services (`Converter`, `Formatter`)
//!
//! # Lifetimes
//!
//! The model is mutable while patterns build it and is frozen behind an `Arc`
//! before execution. Run-time states are created per run and per instance and
//! are never cached.

mod abort;
mod actions;
mod binding;
pub mod chain;
mod convert;
mod data;
mod model;
mod state;

pub use abort::{AbortReason, AbortSignal};
pub use actions::{TestActions, TestInstanceActions};
pub use binding::{
    BindingError, Column, DataBinder, DataBindingAccessor, DataBindingContext, DataBindingItem,
    JoinStrategy,
};
pub use chain::{ActionChain, DecoratorChain};
pub use convert::{ConversionError, Converter, DefaultConverter, DefaultFormatter, Formatter};
pub use data::{DataContext, DataRow, DataSource};
pub use model::TestModel;
pub use state::{DataKey, TestInstanceState, TestState, UserData};
pub use test::{Metadata, Test, TestKind, TestParameter};
