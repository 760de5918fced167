//! The lifecycle engine.
//!
//! Runs a `RunPlan` over a frozen `TestModel`. For every planned test:
//!
//! ```text
//! BeforeTest -> InitializeTest -> { per data item: instance } -> DisposeTest -> AfterTest
//! ```
//!
//! and for every instance:
//!
//! ```text
//! DecorateTestInstance
//! BeforeInstance                    always
//!   Initialize                      if BeforeInstance passed
//!     SetUp                         if Initialize passed
//!       Execute                     if SetUp passed
//!         children                  if Execute passed
//!     TearDown                      iff Initialize passed
//!   Dispose                         iff BeforeInstance passed
//! AfterInstance                     always
//! ```
//!
//! Children run from inside their parent's instance. Parallelizable leaf
//! children without dependencies are handed to the scheduler as one batch;
//! the rest run in plan order on the current thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use galena_ir::{CodeElement, TestFailure, TestId, TestOutcome, Value};
use galena_model::{
    AbortSignal, Converter, DataBindingContext, DataBindingItem, DefaultConverter,
    DefaultFormatter, Formatter, Test, TestActions, TestInstanceActions, TestInstanceState,
    TestModel, TestState,
};
use galena_sched::{Job, WorkScheduler};

use crate::sandbox::{Phase, PhaseOutcome, Sandbox, Watchdog};
use crate::stack::ensure_sufficient_stack;
use crate::{
    CancellationToken, EngineConfig, PlanNode, RunListener, RunPlan, RunReport, StepId, StepInfo,
    StepResult,
};

/// Message of a test skipped because a dependency did not pass.
pub const UNSATISFIED_DEPENDENCY: &str = "Skipped due to an unsatisfied test dependency.";

/// Message of a test case whose body was not run.
pub const EXECUTION_SKIPPED: &str = "Test execution was skipped.";

/// Message of a data-driven test whose sources produced no rows.
pub const NO_DATA_ITEMS: &str = "The test has no data items.";

/// Runs test models.
pub struct TestEngine {
    config: EngineConfig,
    scheduler: WorkScheduler,
    converter: Arc<dyn Converter>,
    formatter: Arc<dyn Formatter>,
}

impl TestEngine {
    pub fn new(config: EngineConfig, scheduler: WorkScheduler) -> Self {
        TestEngine {
            config,
            scheduler,
            converter: Arc::new(DefaultConverter),
            formatter: Arc::new(DefaultFormatter),
        }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &WorkScheduler {
        &self.scheduler
    }

    /// Run every test of `plan`, streaming steps to `listener`.
    ///
    /// Never fails: problems surface as step outcomes.
    #[tracing::instrument(level = "debug", skip_all, fields(tests = plan.len()))]
    pub fn run(
        &self,
        model: &Arc<TestModel>,
        plan: &RunPlan,
        listener: Arc<dyn RunListener>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let started = Instant::now();
        let Some(root) = plan.root() else {
            debug!("run plan is empty");
            return RunReport::new(Vec::new(), started.elapsed());
        };

        let run = Arc::new(Run {
            model: Arc::clone(model),
            config: self.config.clone(),
            scheduler: self.scheduler.clone(),
            converter: Arc::clone(&self.converter),
            formatter: Arc::clone(&self.formatter),
            listener,
            dependencies: plan.dependencies().clone(),
            next_step: AtomicU32::new(0),
            results: Mutex::new(Vec::new()),
            ledger: Mutex::new(FxHashMap::default()),
        });
        let actions = model.test(root.test).actions.clone();
        run.run_test(root, actions, cancel.signal(), None);

        let results = std::mem::take(&mut *run.results.lock());
        let report = RunReport::new(results, started.elapsed());
        debug!(%report, "run finished");
        report
    }
}

impl std::fmt::Debug for TestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEngine")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// Shared state of one run. Jobs handed to the scheduler hold an `Arc`.
struct Run {
    model: Arc<TestModel>,
    config: EngineConfig,
    scheduler: WorkScheduler,
    converter: Arc<dyn Converter>,
    formatter: Arc<dyn Formatter>,
    listener: Arc<dyn RunListener>,
    /// Planned dependencies of each test.
    dependencies: FxHashMap<TestId, Vec<TestId>>,
    next_step: AtomicU32,
    results: Mutex<Vec<StepResult>>,
    /// Outcome of every finished primary step.
    ledger: Mutex<FxHashMap<TestId, TestOutcome>>,
}

impl Run {
    #[tracing::instrument(level = "trace", skip_all, fields(test = ?node.test))]
    fn run_test(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        actions: TestActions,
        parent_signal: &AbortSignal,
        parent_step: Option<StepId>,
    ) -> TestOutcome {
        ensure_sufficient_stack(|| {
            let test = self.model.test(node.test);
            let data_driven = !test.parameters.is_empty();
            let step = self.open_step(
                parent_step,
                node.test,
                test.name.clone(),
                true,
                test.is_test_case && !data_driven,
            );
            let started = Instant::now();
            let sandbox = Sandbox::new(parent_signal.child());

            let mut log = Vec::new();
            let outcome = if let Some(aborted) = sandbox.aborted() {
                aborted
            } else if self.has_unsatisfied_dependency(node.test) {
                debug!(test = %test.name, "dependency not satisfied");
                PhaseOutcome::new(TestOutcome::Skipped, UNSATISFIED_DEPENDENCY)
            } else {
                self.run_test_body(node, actions, &sandbox, &step, data_driven, &mut log)
            };
            self.finish_step(step, outcome, started, log)
        })
    }

    fn run_test_body(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        actions: TestActions,
        sandbox: &Sandbox,
        step: &StepInfo,
        data_driven: bool,
        log: &mut Vec<String>,
    ) -> PhaseOutcome {
        let test = self.model.test(node.test);
        let actions = Arc::new(actions);
        let mut state = TestState::new(
            node.test,
            Arc::from(test.name.as_str()),
            Arc::clone(&actions),
            DataBindingContext::new(self.config.join_strategy),
            Arc::clone(&self.converter),
            Arc::clone(&self.formatter),
            node.is_explicit,
        );

        let mut outcome = sandbox.run(Phase::BeforeTest, || {
            state
                .register_parameters(&self.model)
                .map_err(|err| TestFailure::error(err.to_string()))?;
            actions.before_test.call(&mut state)
        });
        if outcome.is_passed() {
            outcome.merge(sandbox.run(Phase::InitializeTest, || {
                actions.initialize_test.call(&mut state)
            }));
            if outcome.is_passed() {
                let instances =
                    self.run_instances(node, &mut state, sandbox, step, data_driven, log);
                outcome.merge(instances);
            }
            outcome.merge(sandbox.run_finalizer(Phase::DisposeTest, || {
                actions.dispose_test.call(&mut state)
            }));
        }
        outcome.merge(sandbox.run_finalizer(Phase::AfterTest, || {
            actions.after_test.call(&mut state)
        }));
        log.append(&mut state.log);
        outcome
    }

    fn run_instances(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        state: &mut TestState,
        sandbox: &Sandbox,
        step: &StepInfo,
        data_driven: bool,
        log: &mut Vec<String>,
    ) -> PhaseOutcome {
        let items = state
            .binding_context
            .items(!self.config.options.skip_dynamic_tests);
        if items.is_empty() {
            return PhaseOutcome::new(TestOutcome::Skipped, NO_DATA_ITEMS);
        }

        let test = self.model.test(node.test);
        let mut outcome = PhaseOutcome::passed();
        for item in items {
            if let Some(aborted) = sandbox.aborted() {
                outcome.merge(aborted);
                break;
            }
            let bound = state.bind_slots(&self.model, &item);
            if !data_driven {
                outcome.merge(match bound {
                    Ok(slots) => self.run_instance(
                        node,
                        state,
                        item,
                        slots,
                        sandbox.signal(),
                        step.id,
                        log,
                    ),
                    Err(err) => PhaseOutcome::new(TestOutcome::Error, err.to_string()),
                });
                continue;
            }

            let name = match &bound {
                Ok(slots) => {
                    let values: Vec<Value> = slots.iter().map(|(_, value)| value.clone()).collect();
                    format!("{}({})", state.test_name, self.formatter.format_values(&values))
                }
                Err(_) => state.test_name.to_string(),
            };
            let instance_step =
                self.open_step(Some(step.id), node.test, name, false, test.is_test_case);
            let started = Instant::now();
            let mut instance_log = Vec::new();
            let result = match bound {
                Ok(slots) => self.run_instance(
                    node,
                    state,
                    item,
                    slots,
                    sandbox.signal(),
                    instance_step.id,
                    &mut instance_log,
                ),
                Err(err) => PhaseOutcome::new(TestOutcome::Error, err.to_string()),
            };
            let finished = self.finish_step(instance_step, result, started, instance_log);
            outcome.merge_generalized(finished);
        }
        outcome
    }

    #[tracing::instrument(level = "trace", skip_all, fields(test = ?node.test, step = ?step))]
    #[expect(
        clippy::too_many_arguments,
        reason = "one instance needs its test state, item, bound slots, signal and step"
    )]
    fn run_instance(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        test_state: &mut TestState,
        item: DataBindingItem,
        slots: Vec<(CodeElement, Value)>,
        parent_signal: &AbortSignal,
        step: StepId,
        log: &mut Vec<String>,
    ) -> PhaseOutcome {
        let test = self.model.test(node.test);
        let mut instance_actions = test_state.actions.instance.clone();
        let test_actions = Arc::clone(&test_state.actions);
        let decorated = Sandbox::new(parent_signal.clone()).run(Phase::DecorateTestInstance, || {
            test_actions
                .decorate_test_instance
                .call(test_state, &mut instance_actions)
        });
        if !decorated.is_passed() {
            return decorated;
        }

        let signal = parent_signal.child();
        let _watchdog = self
            .timeout_for(test)
            .map(|timeout| Watchdog::arm(timeout, signal.clone()));
        let actions = Arc::new(instance_actions);
        let mut state = TestInstanceState::new(
            test_state,
            Arc::clone(&actions),
            item,
            slots,
            signal.clone(),
        );
        let sandbox = Sandbox::new(signal);

        let outcome = if self.config.options.skip_test_execution {
            let mut outcome = if test.is_test_case {
                PhaseOutcome::new(TestOutcome::Skipped, EXECUTION_SKIPPED)
            } else {
                PhaseOutcome::passed()
            };
            outcome.merge_generalized(self.run_children(node, &mut state, &sandbox, step));
            outcome
        } else {
            self.run_phases(node, &actions, &mut state, &sandbox, step)
        };
        log.append(&mut state.log);
        outcome
    }

    fn run_phases(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        actions: &TestInstanceActions,
        state: &mut TestInstanceState,
        sandbox: &Sandbox,
        step: StepId,
    ) -> PhaseOutcome {
        let mut outcome =
            sandbox.run(Phase::BeforeInstance, || actions.before_instance.call(state));
        if outcome.is_passed() {
            let initialize = sandbox.run(Phase::Initialize, || actions.initialize.call(state));
            let initialized = initialize.is_passed();
            outcome.merge(initialize);
            if initialized {
                let set_up = sandbox.run(Phase::SetUp, || actions.set_up.call(state));
                let ready = set_up.is_passed();
                outcome.merge(set_up);
                if ready {
                    let execute = sandbox.run(Phase::Execute, || actions.execute.call(state));
                    let executed = execute.is_passed();
                    outcome.merge(execute);
                    if executed {
                        outcome.merge_generalized(self.run_children(node, state, sandbox, step));
                    }
                }
                outcome.merge(
                    sandbox.run_finalizer(Phase::TearDown, || actions.tear_down.call(state)),
                );
            }
            outcome.merge(sandbox.run_finalizer(Phase::Dispose, || actions.dispose.call(state)));
        }
        outcome.merge(
            sandbox.run_finalizer(Phase::AfterInstance, || actions.after_instance.call(state)),
        );
        outcome
    }

    /// Run the planned children of `node` inside `parent`. Returns the raw
    /// merge of their outcomes; the caller generalizes it.
    fn run_children(
        self: &Arc<Self>,
        node: &Arc<PlanNode>,
        parent: &mut TestInstanceState,
        sandbox: &Sandbox,
        step: StepId,
    ) -> TestOutcome {
        if node.children.is_empty() {
            return TestOutcome::Passed;
        }
        let model = &self.model;
        let (mut parallel, mut sequential): (
            SmallVec<[&Arc<PlanNode>; 8]>,
            SmallVec<[&Arc<PlanNode>; 8]>,
        ) = node.children.iter().partition(|child| {
            model.test(child.test).is_parallelizable
                && !self.dependencies.contains_key(&child.test)
                && child.children.is_empty()
        });
        if parallel.len() < 2 {
            parallel.clear();
            sequential = node.children.iter().collect();
        }

        let mut outcome = TestOutcome::Passed;
        if !parallel.is_empty() {
            outcome = outcome.combine(self.run_parallel(&parallel, parent, sandbox, step));
        }
        for child in sequential {
            let child_outcome = match self.decorate_child(parent, sandbox, child.test) {
                Ok(actions) => self.run_test(child, actions, sandbox.signal(), Some(step)),
                Err(failed) => self.report_unrun(child.test, step, failed),
            };
            outcome = outcome.combine(child_outcome);
        }
        outcome
    }

    /// Decorate every child on this thread, then run them as one work set.
    fn run_parallel(
        self: &Arc<Self>,
        children: &[&Arc<PlanNode>],
        parent: &mut TestInstanceState,
        sandbox: &Sandbox,
        step: StepId,
    ) -> TestOutcome {
        let slots: Arc<Mutex<Vec<Option<TestOutcome>>>> =
            Arc::new(Mutex::new(vec![None; children.len()]));
        let mut jobs: Vec<Job> = Vec::with_capacity(children.len());
        for (index, child) in children.iter().enumerate() {
            match self.decorate_child(parent, sandbox, child.test) {
                Ok(actions) => {
                    let run = Arc::clone(self);
                    let child = Arc::clone(child);
                    let signal = sandbox.signal().clone();
                    let slots = Arc::clone(&slots);
                    jobs.push(Box::new(move || {
                        let outcome = run.run_test(&child, actions, &signal, Some(step));
                        slots.lock()[index] = Some(outcome);
                    }));
                }
                Err(failed) => {
                    let outcome = self.report_unrun(child.test, step, failed);
                    slots.lock()[index] = Some(outcome);
                }
            }
        }
        trace!(jobs = jobs.len(), "parallel batch scheduled");
        self.scheduler.run(jobs);

        let slots = slots.lock();
        slots.iter().fold(TestOutcome::Passed, |acc, slot| match slot {
            Some(outcome) => acc.combine(*outcome),
            None => {
                warn!("a parallel test job ended without reporting an outcome");
                acc.combine(TestOutcome::Error)
            }
        })
    }

    fn decorate_child(
        &self,
        parent: &mut TestInstanceState,
        sandbox: &Sandbox,
        child: TestId,
    ) -> Result<TestActions, PhaseOutcome> {
        let mut actions = self.model.test(child).actions.clone();
        let decorators = Arc::clone(&parent.actions);
        let outcome = sandbox.run(Phase::DecorateChildTest, || {
            decorators.decorate_child_test.call(parent, &mut actions)
        });
        if outcome.is_passed() {
            Ok(actions)
        } else {
            Err(outcome)
        }
    }

    /// Report a child that could not start.
    fn report_unrun(&self, test: TestId, parent: StepId, outcome: PhaseOutcome) -> TestOutcome {
        let node = self.model.test(test);
        let step = self.open_step(
            Some(parent),
            test,
            node.name.clone(),
            true,
            node.is_test_case && node.parameters.is_empty(),
        );
        self.finish_step(step, outcome, Instant::now(), Vec::new())
    }

    fn has_unsatisfied_dependency(&self, test: TestId) -> bool {
        let Some(dependencies) = self.dependencies.get(&test) else {
            return false;
        };
        let ledger = self.ledger.lock();
        dependencies
            .iter()
            .any(|dependency| ledger.get(dependency) != Some(&TestOutcome::Passed))
    }

    fn timeout_for(&self, test: &Test) -> Option<Duration> {
        test.timeout.or(if test.is_test_case {
            self.config.default_timeout
        } else {
            None
        })
    }

    fn open_step(
        &self,
        parent: Option<StepId>,
        test: TestId,
        name: String,
        is_primary: bool,
        is_test_case: bool,
    ) -> StepInfo {
        let id = StepId::new(self.next_step.fetch_add(1, Ordering::Relaxed));
        let path = self.model.full_name(test);
        let full_name = if is_primary {
            path
        } else {
            match path.rsplit_once('/') {
                Some((prefix, _)) => format!("{prefix}/{name}"),
                None => name.clone(),
            }
        };
        let step = StepInfo {
            id,
            parent,
            test,
            name,
            full_name,
            is_primary,
            is_test_case,
        };
        trace!(step = ?step.id, name = %step.full_name, "step started");
        self.listener.step_started(&step);
        step
    }

    fn finish_step(
        &self,
        step: StepInfo,
        outcome: PhaseOutcome,
        started: Instant,
        log: Vec<String>,
    ) -> TestOutcome {
        let result = StepResult {
            step,
            outcome: outcome.outcome,
            message: outcome.message,
            duration: started.elapsed(),
            log,
        };
        if result.step.is_primary {
            self.ledger.lock().insert(result.step.test, result.outcome);
        }
        debug!(
            name = %result.step.full_name,
            outcome = %result.outcome,
            "step finished"
        );
        self.listener.step_finished(&result);
        let outcome = result.outcome;
        self.results.lock().push(result);
        outcome
    }
}
