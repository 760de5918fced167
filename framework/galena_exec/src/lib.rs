//! Galena Exec - runs a frozen test model.
//!
//! This crate provides:
//! - `TestFilter` and `RunPlan`: which tests run, in which order
//! - `TestEngine`: the lifecycle state machine over plans
//! - `Sandbox` and `Watchdog`: guarded phases, timeouts and aborts
//! - `RunListener` and `RunReport`: streaming and collected step results
//!
//! # Isolation
//!
//! Nothing a test does escapes its step. Failures, panics, timeouts and
//! cancellation all become outcomes, and finalizers run in every case.

mod cancel;
mod engine;
mod filter;
mod options;
mod plan;
mod report;
mod sandbox;
mod stack;

pub use cancel::CancellationToken;
pub use engine::{TestEngine, EXECUTION_SKIPPED, NO_DATA_ITEMS, UNSATISFIED_DEPENDENCY};
pub use filter::TestFilter;
pub use options::{EngineConfig, ExecutionOptions};
pub use plan::{PlanNode, RunPlan};
pub use report::{NullListener, RunListener, RunReport, StepId, StepInfo, StepResult};
pub use sandbox::{timeout_message, Phase, PhaseOutcome, Sandbox, Watchdog};
