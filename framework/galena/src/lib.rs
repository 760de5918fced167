//! Galena - an extensible test framework runtime.
//!
//! A `TestSession` ties the pieces together: patterns attached to code
//! elements are evaluated into a `TestModel`, which is then planned and run
//! by the lifecycle engine on a bounded work scheduler.
//!
//! ```text
//! let session = TestSession::new(code, resolver, RunnerConfig::from_env()?);
//! let discovery = session.discover(&[assembly]);
//! let report = session.run_all(&discovery.model);
//! std::process::exit(report.exit_code());
//! ```

mod config;
mod logging;
mod session;

pub use config::{ConfigError, ParallelismConfig, RunnerConfig, THREADS_ENV, TIMEOUT_ENV};
pub use logging::{init_tracing, LOG_ENV, LOG_TREE_ENV};
pub use session::{Discovery, TestSession};

pub use galena_diagnostic::{Annotation, AnnotationCode, Severity};
pub use galena_exec::{
    CancellationToken, ExecutionOptions, NullListener, RunListener, RunReport, StepInfo,
    StepResult, TestFilter, EXECUTION_SKIPPED, NO_DATA_ITEMS, UNSATISFIED_DEPENDENCY,
};
pub use galena_ir::{CatalogBuilder, CodeCatalog, CodeElement, TestFailure, TestOutcome, Value};
pub use galena_model::{JoinStrategy, TestModel};
pub use galena_patterns::{builtins, PatternTable};
