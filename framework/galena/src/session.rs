//! Discovery and execution sessions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use galena_diagnostic::{Annotation, Severity};
use galena_exec::{
    CancellationToken, NullListener, RunListener, RunPlan, RunReport, TestEngine, TestFilter,
};
use galena_ir::{CodeElement, CodeModel, TestId};
use galena_model::{Converter, Formatter, TestModel};
use galena_patterns::{Evaluator, PatternResolver};
use galena_sched::WorkScheduler;

use crate::{ParallelismConfig, RunnerConfig};

/// Result of evaluating patterns over one or more assemblies.
#[derive(Debug)]
pub struct Discovery {
    pub model: Arc<TestModel>,
    /// Problems found while building the model, in the order found.
    pub annotations: Vec<Annotation>,
}

impl Discovery {
    pub fn has_errors(&self) -> bool {
        self.annotations.iter().any(Annotation::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(|annotation| annotation.is_error())
    }

    /// Test with the given `/`-separated name path below the root.
    pub fn find(&self, full_name: &str) -> Option<TestId> {
        self.model
            .tests()
            .find(|test| test.parent.is_some() && self.model.full_name(test.id) == full_name)
            .map(|test| test.id)
    }
}

/// Discovers and runs tests for one code model.
pub struct TestSession {
    code: Arc<dyn CodeModel>,
    resolver: Arc<dyn PatternResolver>,
    config: RunnerConfig,
    parallelism: ParallelismConfig,
    engine: TestEngine,
}

impl TestSession {
    pub fn new(
        code: Arc<dyn CodeModel>,
        resolver: Arc<dyn PatternResolver>,
        config: RunnerConfig,
    ) -> Self {
        let parallelism = ParallelismConfig::new(config.degree_of_parallelism);
        let degree = parallelism.clone();
        let scheduler = WorkScheduler::new(move || degree.degree());
        let engine = TestEngine::new(config.engine_config(), scheduler);
        TestSession {
            code,
            resolver,
            config,
            parallelism,
            engine,
        }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.engine = self.engine.with_converter(converter);
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.engine = self.engine.with_formatter(formatter);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Live degree of parallelism; changes apply to runs in progress.
    pub fn parallelism(&self) -> &ParallelismConfig {
        &self.parallelism
    }

    /// Build the test model for `assemblies`.
    #[tracing::instrument(level = "debug", skip_all, fields(assemblies = assemblies.len()))]
    pub fn discover(&self, assemblies: &[CodeElement]) -> Discovery {
        let mut evaluator = Evaluator::new(Arc::clone(&self.code), Arc::clone(&self.resolver));
        for &assembly in assemblies {
            evaluator.evaluate(assembly, false);
        }
        let mut model = evaluator.finish_model();
        let annotations = model.take_annotations();
        for annotation in &annotations {
            match annotation.severity {
                Severity::Error => warn!(%annotation, "discovery problem"),
                _ => debug!(%annotation, "discovery note"),
            }
        }
        debug!(tests = model.len(), annotations = annotations.len(), "discovery finished");
        Discovery {
            model: Arc::new(model),
            annotations,
        }
    }

    pub fn plan(&self, model: &TestModel, filter: &TestFilter) -> RunPlan {
        RunPlan::build(model, filter, self.config.options)
    }

    /// Run the tests `filter` selects.
    pub fn run(
        &self,
        model: &Arc<TestModel>,
        filter: &TestFilter,
        listener: Arc<dyn RunListener>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let plan = self.plan(model, filter);
        let report = self.engine.run(model, &plan, listener, cancel);
        info!(%report, exit_code = report.exit_code(), "test run complete");
        report
    }

    /// Run every non-explicit test without a listener.
    pub fn run_all(&self, model: &Arc<TestModel>) -> RunReport {
        self.run(
            model,
            &TestFilter::All,
            Arc::new(NullListener),
            &CancellationToken::new(),
        )
    }
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
