//! Galena Sched - bounded, re-entrant parallel work scheduling.
//!
//! `WorkScheduler::run` blocks until every job it was given has finished,
//! running up to `max_threads()` jobs at once. The calling thread drains its
//! own work set instead of waiting passively, and background workers drain
//! every pending work set in FIFO order. A job may therefore call `run`
//! again (a fixture running its parallel children) without exhausting the
//! pool and deadlocking.
//!
//! Panicking jobs never take a worker down: the panic is reported to the
//! scheduler's `UnhandledFailurePolicy` and the remaining jobs continue.

mod policy;
mod scheduler;

pub use policy::{LogUnhandledFailures, UnhandledFailurePolicy};
pub use scheduler::{default_max_threads, Job, WorkScheduler};
