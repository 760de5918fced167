use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use galena::builtins::{
    DecoratorPattern, LifecycleMethodPattern, ParallelizablePattern, TestMethodPattern,
};
use galena::{CatalogBuilder, PatternTable, TestFailure, TestOutcome};
use galena_ir::{Fixture, MethodInvoker};

use crate::common::{noop, outcome_of, session, Journal};

#[derive(Default)]
struct Service {
    queries: AtomicUsize,
}

fn counting_dispose(disposes: &Arc<AtomicUsize>) -> DecoratorPattern {
    let disposes = Arc::clone(disposes);
    DecoratorPattern::new(0, move |actions| {
        let disposes = Arc::clone(&disposes);
        actions.instance.dispose.after(move |_| {
            disposes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    })
}

fn uses_service() -> MethodInvoker {
    Arc::new(|fixture, _| {
        let service = fixture
            .and_then(|fixture| fixture.downcast_ref::<Service>())
            .ok_or_else(|| TestFailure::failed("no service instance"))?;
        service.queries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_failing_set_up_is_isolated_to_its_test() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Suite");
    let ty = b.add_type(asm, "Service");
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    b.add_constructor(
        ty,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Service::default()) as Fixture)
        }),
    );
    let methods: Vec<_> = ["connect", "query", "close"]
        .iter()
        .map(|name| b.add_method(ty, name, uses_service()))
        .collect();

    let disposes = Arc::new(AtomicUsize::new(0));
    let mut table = PatternTable::new();
    table.attach(ty, counting_dispose(&disposes));
    for &method in &methods {
        table
            .attach(method, TestMethodPattern)
            .attach(method, ParallelizablePattern)
            .attach(method, counting_dispose(&disposes));
    }
    table.attach(
        methods[1],
        DecoratorPattern::new(0, |actions| {
            actions
                .instance
                .set_up
                .after(|_| Err(TestFailure::failed("database unavailable")));
        }),
    );

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    assert!(!discovery.has_errors());
    let report = session.run_all(&discovery.model);

    assert_eq!(
        outcome_of(&discovery, &report, "Suite/Service/connect"),
        TestOutcome::Passed
    );
    assert_eq!(
        outcome_of(&discovery, &report, "Suite/Service/close"),
        TestOutcome::Passed
    );
    let query = report.find("Suite/Service/query").unwrap();
    assert_eq!(query.outcome, TestOutcome::Failed);
    assert_eq!(query.message.as_deref(), Some("database unavailable"));
    assert_eq!(
        outcome_of(&discovery, &report, "Suite/Service"),
        TestOutcome::Inconclusive
    );

    // One instance per test plus the fixture itself, each disposed once.
    assert_eq!(disposes.load(Ordering::SeqCst), 4);
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(report.test_case_count(), 3);
    assert_eq!(report.count(TestOutcome::Failed), 1);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_lifecycle_methods_wrap_each_test() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Suite");
    let ty = b.add_type(asm, "Accounts");
    let fixture_set_up = b.add_method(ty, "fixture_set_up", journal.invoker("fixture_set_up"));
    let set_up = b.add_method(ty, "set_up", journal.invoker("set_up"));
    let tear_down = b.add_method(ty, "tear_down", journal.invoker("tear_down"));
    let fixture_tear_down =
        b.add_method(ty, "fixture_tear_down", journal.invoker("fixture_tear_down"));
    let open = b.add_method(ty, "open", journal.invoker("open"));
    let close = b.add_method(ty, "close", journal.invoker("close"));

    let mut table = PatternTable::new();
    table
        .attach(fixture_set_up, LifecycleMethodPattern::fixture_set_up())
        .attach(set_up, LifecycleMethodPattern::set_up())
        .attach(tear_down, LifecycleMethodPattern::tear_down())
        .attach(fixture_tear_down, LifecycleMethodPattern::fixture_tear_down())
        .attach(open, TestMethodPattern)
        .attach(close, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run_all(&discovery.model);

    assert_eq!(
        journal.entries(),
        vec![
            "fixture_set_up",
            "set_up",
            "open",
            "tear_down",
            "set_up",
            "close",
            "tear_down",
            "fixture_tear_down",
        ]
    );
    assert_eq!(report.count(TestOutcome::Passed), 2);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_tear_down_runs_after_failed_set_up() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Suite");
    let ty = b.add_type(asm, "Files");
    let set_up = b.add_method(
        ty,
        "set_up",
        Arc::new(|_, _| Err(TestFailure::error("disk full"))),
    );
    let tear_down = b.add_method(ty, "tear_down", journal.invoker("tear_down"));
    let write = b.add_method(ty, "write", journal.invoker("write"));

    let mut table = PatternTable::new();
    table
        .attach(set_up, LifecycleMethodPattern::set_up())
        .attach(tear_down, LifecycleMethodPattern::tear_down())
        .attach(write, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run_all(&discovery.model);

    assert_eq!(journal.entries(), vec!["tear_down"]);
    let write = report.find("Suite/Files/write").unwrap();
    assert_eq!(write.outcome, TestOutcome::Error);
    assert_eq!(write.message.as_deref(), Some("disk full"));
}

#[test]
fn test_fixture_without_tests_is_not_discovered() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Suite");
    let helpers = b.add_type(asm, "Helpers");
    b.add_method(helpers, "format", noop());

    let session = session(b.build(), PatternTable::new());
    let discovery = session.discover(&[asm]);
    assert!(discovery.find("Suite/Helpers").is_none());

    let report = session.run_all(&discovery.model);
    assert_eq!(report.test_case_count(), 0);
    assert_eq!(report.exit_code(), 2);
}
