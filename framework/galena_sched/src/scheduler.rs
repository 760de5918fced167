//! The work scheduler.

use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use galena_ir::panic_message;

use crate::{LogUnhandledFailures, UnhandledFailurePolicy};

/// A unit of scheduled work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

type MaxThreads = Arc<dyn Fn() -> usize + Send + Sync>;

thread_local! {
    /// Whether this thread already counts toward `active_threads`.
    static HOLDS_SLOT: Cell<bool> = const { Cell::new(false) };
}

/// Jobs of one `run` call.
struct WorkSet {
    queue: VecDeque<Job>,
    in_progress: usize,
}

struct State {
    sets: FxHashMap<u64, WorkSet>,
    /// Work sets in submission order; exhausted sets are dropped lazily.
    order: VecDeque<u64>,
    next_id: u64,
    /// Threads currently draining work: workers plus external callers of
    /// `run` that are executing their own jobs.
    active_threads: usize,
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
    max_threads: MaxThreads,
    policy: Arc<dyn UnhandledFailurePolicy>,
}

/// Runs batches of independent jobs with a live concurrency bound.
///
/// Cloning is cheap; clones share the same queue and workers.
#[derive(Clone)]
pub struct WorkScheduler {
    shared: Arc<Shared>,
}

/// Available hardware parallelism, at least 1.
pub fn default_max_threads() -> usize {
    thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

impl Default for WorkScheduler {
    fn default() -> Self {
        Self::new(default_max_threads)
    }
}

impl WorkScheduler {
    /// `max_threads` is queried every time a worker might be forked, so the
    /// bound may change while work is running.
    pub fn new(max_threads: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        Self::with_policy(max_threads, Arc::new(LogUnhandledFailures))
    }

    pub fn with_policy(
        max_threads: impl Fn() -> usize + Send + Sync + 'static,
        policy: Arc<dyn UnhandledFailurePolicy>,
    ) -> Self {
        WorkScheduler {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    sets: FxHashMap::default(),
                    order: VecDeque::new(),
                    next_id: 0,
                    active_threads: 0,
                }),
                changed: Condvar::new(),
                max_threads: Arc::new(max_threads),
                policy,
            }),
        }
    }

    /// Current concurrency bound, never below 1.
    pub fn max_threads(&self) -> usize {
        (self.shared.max_threads)().max(1)
    }

    /// Number of threads draining work right now, callers of `run`
    /// included.
    pub fn active_threads(&self) -> usize {
        self.shared.state.lock().active_threads
    }

    /// Run every job and return once all of them have finished.
    ///
    /// Safe to call from inside a job of the same scheduler. Callers on
    /// different threads share the bound: a caller only runs jobs itself
    /// while it holds one of the slots, otherwise it waits for workers to
    /// drain its work set.
    pub fn run(&self, jobs: Vec<Job>) {
        if jobs.is_empty() {
            return;
        }
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        trace!(work_set = id, jobs = jobs.len(), "work set queued");
        state.sets.insert(
            id,
            WorkSet {
                queue: jobs.into(),
                in_progress: 0,
            },
        );
        state.order.push_back(id);

        // Nested calls reuse the slot of the job that made them.
        let mut holds_slot = HOLDS_SLOT.get();
        let mut acquired = false;
        loop {
            let Some(set) = state.sets.get(&id) else {
                break;
            };
            if set.queue.is_empty() {
                if set.in_progress > 0 {
                    shared.changed.wait(&mut state);
                    continue;
                }
                state.sets.remove(&id);
                state.order.retain(|queued| *queued != id);
                trace!(work_set = id, "work set complete");
                break;
            }
            if !holds_slot {
                if state.active_threads >= (shared.max_threads)().max(1) {
                    shared.changed.wait(&mut state);
                    continue;
                }
                state.active_threads += 1;
                HOLDS_SLOT.set(true);
                holds_slot = true;
                acquired = true;
            }

            let Some(set) = state.sets.get_mut(&id) else {
                break;
            };
            let Some(job) = set.queue.pop_front() else {
                continue;
            };
            set.in_progress += 1;
            if !set.queue.is_empty() {
                Self::maybe_fork(shared, &mut state);
            }
            MutexGuard::unlocked(&mut state, || Self::run_job(shared, job));
            if let Some(set) = state.sets.get_mut(&id) {
                set.in_progress -= 1;
            }
            shared.changed.notify_all();
        }

        if acquired {
            state.active_threads -= 1;
            HOLDS_SLOT.set(false);
            shared.changed.notify_all();
        }
    }

    /// Start one more background worker if the live bound allows it.
    fn maybe_fork(shared: &Arc<Shared>, state: &mut State) {
        let max = (shared.max_threads)().max(1);
        if state.active_threads >= max {
            return;
        }
        state.active_threads += 1;
        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("galena-worker".to_owned())
            .spawn(move || Self::worker_loop(&worker));
        if let Err(err) = spawned {
            state.active_threads -= 1;
            warn!(%err, "failed to start a scheduler worker");
        }
    }

    /// Drain the global FIFO of work sets until none has pending jobs.
    fn worker_loop(shared: &Arc<Shared>) {
        HOLDS_SLOT.set(true);
        let mut state = shared.state.lock();
        loop {
            let Some((id, job)) = Self::next_global_job(&mut state) else {
                state.active_threads -= 1;
                trace!("scheduler worker exiting");
                shared.changed.notify_all();
                return;
            };
            MutexGuard::unlocked(&mut state, || Self::run_job(shared, job));
            if let Some(set) = state.sets.get_mut(&id) {
                set.in_progress -= 1;
            }
            shared.changed.notify_all();
        }
    }

    fn next_global_job(state: &mut State) -> Option<(u64, Job)> {
        while let Some(&id) = state.order.front() {
            if let Some(set) = state.sets.get_mut(&id) {
                if let Some(job) = set.queue.pop_front() {
                    set.in_progress += 1;
                    return Some((id, job));
                }
            }
            state.order.pop_front();
        }
        None
    }

    fn run_job(shared: &Shared, job: Job) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            shared
                .policy
                .on_unhandled_failure(&panic_message(&*payload));
        }
    }
}

impl std::fmt::Debug for WorkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkScheduler")
            .field("work_sets", &state.sets.len())
            .field("active_threads", &state.active_threads)
            .finish_non_exhaustive()
    }
}
