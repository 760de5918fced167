use std::sync::Arc;

use parking_lot::Mutex;

use galena::{
    CodeCatalog, Discovery, PatternTable, RunReport, RunnerConfig, TestOutcome, TestSession,
};
use galena_ir::MethodInvoker;

pub fn noop() -> MethodInvoker {
    Arc::new(|_, _| Ok(()))
}

pub fn session(code: CodeCatalog, table: PatternTable) -> TestSession {
    TestSession::new(
        Arc::new(code),
        Arc::new(table),
        RunnerConfig::default().with_parallelism(4),
    )
}

/// Outcome of the primary step of the test named `full_name`.
pub fn outcome_of(discovery: &Discovery, report: &RunReport, full_name: &str) -> TestOutcome {
    let test = discovery
        .find(full_name)
        .unwrap_or_else(|| panic!("no test named {full_name}"));
    report
        .outcome_of(test)
        .unwrap_or_else(|| panic!("{full_name} did not run"))
}

/// Hook invocations in call order.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: &str) {
        self.0.lock().push(entry.to_owned());
    }

    /// Method body that records `entry` and succeeds.
    pub fn invoker(&self, entry: &str) -> MethodInvoker {
        let journal = self.clone();
        let entry = entry.to_owned();
        Arc::new(move |_, _| {
            journal.push(&entry);
            Ok(())
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}
