use std::time::Duration;

use galena_model::JoinStrategy;

/// Switches that change what a run executes, not how.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "Options struct: each bool controls an independent switch"
)]
pub struct ExecutionOptions {
    /// Do not produce instances for dynamic data rows.
    pub skip_dynamic_tests: bool,
    /// Walk the tree without running any instance phase; test cases report
    /// `Skipped`.
    pub skip_test_execution: bool,
    /// Run only tests the filter selects directly; their ancestors run as
    /// containers, their unselected descendants do not run.
    pub exact_filter: bool,
}

/// Engine-wide settings fixed for the lifetime of a `TestEngine`.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub options: ExecutionOptions,
    /// Applied to tests that declare no timeout of their own.
    pub default_timeout: Option<Duration>,
    /// How a test's data sources are combined into instances.
    pub join_strategy: JoinStrategy,
}
