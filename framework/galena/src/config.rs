//! Runner configuration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use galena_exec::{EngineConfig, ExecutionOptions};
use galena_model::JoinStrategy;
use galena_sched::default_max_threads;

/// Maximum number of concurrently running test cases.
pub const THREADS_ENV: &str = "GALENA_THREADS";

/// Timeout in milliseconds for test cases that declare none; `0` disables it.
pub const TIMEOUT_ENV: &str = "GALENA_TIMEOUT_MS";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Degree of parallelism shared with the scheduler.
///
/// The scheduler reads it every time it considers starting a worker, so a
/// change takes effect while a run is in progress.
#[derive(Clone, Debug)]
pub struct ParallelismConfig {
    degree: Arc<AtomicUsize>,
}

impl ParallelismConfig {
    pub fn new(degree: usize) -> Self {
        ParallelismConfig {
            degree: Arc::new(AtomicUsize::new(degree.max(1))),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree.load(Ordering::Relaxed)
    }

    /// Values below 1 are raised to 1.
    pub fn set_degree(&self, degree: usize) {
        self.degree.store(degree.max(1), Ordering::Relaxed);
    }

    /// Back to the available hardware parallelism.
    pub fn reset(&self) {
        self.set_degree(default_max_threads());
    }
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self::new(default_max_threads())
    }
}

/// Settings for a `TestSession`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    pub degree_of_parallelism: usize,
    pub default_timeout: Option<Duration>,
    pub options: ExecutionOptions,
    pub join_strategy: JoinStrategy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            degree_of_parallelism: default_max_threads(),
            default_timeout: None,
            options: ExecutionOptions::default(),
            join_strategy: JoinStrategy::default(),
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `GALENA_THREADS` and `GALENA_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(THREADS_ENV) {
            config.degree_of_parallelism = match value.trim().parse::<usize>() {
                Ok(threads) if threads > 0 => threads,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: THREADS_ENV,
                        value,
                        expected: "a positive integer",
                    })
                }
            };
        }
        if let Some(value) = lookup(TIMEOUT_ENV) {
            let Ok(millis) = value.trim().parse::<u64>() else {
                return Err(ConfigError::Invalid {
                    var: TIMEOUT_ENV,
                    value,
                    expected: "a number of milliseconds",
                });
            };
            config.default_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        tracing::debug!(?config, "runner configuration");
        Ok(config)
    }

    #[must_use]
    pub fn with_parallelism(mut self, degree: usize) -> Self {
        self.degree_of_parallelism = degree;
        self
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            options: self.options,
            default_timeout: self.default_timeout,
            join_strategy: self.join_strategy,
        }
    }
}
