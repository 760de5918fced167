use std::sync::Arc;

use pretty_assertions::assert_eq;

use galena::builtins::{
    DependsOnPattern, ExplicitPattern, IgnorePattern, MetadataPattern, OrderPattern,
    TestMethodPattern,
};
use galena::{
    CancellationToken, CatalogBuilder, ExecutionOptions, NullListener, PatternTable,
    RunnerConfig, TestFailure, TestFilter, TestOutcome, TestSession, UNSATISFIED_DEPENDENCY,
};
use galena_ir::CodeModel;
use galena_patterns::PatternResolver;

use crate::common::{noop, outcome_of, session, Journal};

#[test]
fn test_explicit_tests_run_only_when_named() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let quick = b.add_method(ty, "quick", journal.invoker("quick"));
    let slow = b.add_method(ty, "slow", journal.invoker("slow"));

    let mut table = PatternTable::new();
    table
        .attach(quick, TestMethodPattern)
        .attach(slow, TestMethodPattern)
        .attach(slow, ExplicitPattern::with_reason("takes minutes"));

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let slow = discovery.find("Sample/Suite/slow").unwrap();

    let report = session.run_all(&discovery.model);
    assert_eq!(report.outcome_of(slow), None);
    assert_eq!(journal.entries(), vec!["quick"]);

    let report = session.run(
        &discovery.model,
        &TestFilter::name("slow"),
        Arc::new(NullListener),
        &CancellationToken::new(),
    );
    assert_eq!(report.outcome_of(slow), Some(TestOutcome::Passed));
    assert_eq!(report.test_case_count(), 1);
    assert_eq!(journal.entries(), vec!["quick", "slow"]);
}

#[test]
fn test_category_filter_with_exact_matching() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let outer = b.add_method(ty, "outer", journal.invoker("outer"));
    let nested = b.add_type(ty, "Nested");
    let inner = b.add_method(nested, "inner", journal.invoker("inner"));

    let mut table = PatternTable::new();
    table
        .attach(ty, MetadataPattern::category("db"))
        .attach(outer, TestMethodPattern)
        .attach(inner, TestMethodPattern);

    let code = Arc::new(b.build());
    let table = Arc::new(table);
    let filter = TestFilter::category("db");
    let session_with = |options| {
        TestSession::new(
            Arc::clone(&code) as Arc<dyn CodeModel>,
            Arc::clone(&table) as Arc<dyn PatternResolver>,
            RunnerConfig::default().with_options(options),
        )
    };

    // The fixture matches, so everything below it runs.
    let session = session_with(ExecutionOptions::default());
    let discovery = session.discover(&[asm]);
    let report = session.run(
        &discovery.model,
        &filter,
        Arc::new(NullListener),
        &CancellationToken::new(),
    );
    assert_eq!(report.test_case_count(), 2);

    // Exact matching runs the fixture alone.
    let exact = session_with(ExecutionOptions {
        exact_filter: true,
        ..ExecutionOptions::default()
    });
    let discovery = exact.discover(&[asm]);
    let report = exact.run(
        &discovery.model,
        &filter,
        Arc::new(NullListener),
        &CancellationToken::new(),
    );
    assert_eq!(report.test_case_count(), 0);
    assert_eq!(
        outcome_of(&discovery, &report, "Sample/Suite"),
        TestOutcome::Passed
    );
    assert_eq!(journal.entries(), vec!["outer", "inner"]);
}

#[test]
fn test_ignored_test_is_skipped_with_reason() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let flaky = b.add_method(ty, "flaky", journal.invoker("flaky"));
    let stable = b.add_method(ty, "stable", journal.invoker("stable"));

    let mut table = PatternTable::new();
    table
        .attach(flaky, TestMethodPattern)
        .attach(flaky, IgnorePattern::new("fails on leap days"))
        .attach(stable, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run_all(&discovery.model);

    let flaky = report.find("Sample/Suite/flaky").unwrap();
    assert_eq!(flaky.outcome, TestOutcome::Skipped);
    assert_eq!(flaky.message.as_deref(), Some("fails on leap days"));
    assert_eq!(journal.entries(), vec!["stable"]);
    assert_eq!(
        outcome_of(&discovery, &report, "Sample/Suite"),
        TestOutcome::Passed
    );
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_dependent_runs_after_and_skips_on_failure() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Orders");
    let ship = b.add_method(ty, "ship", journal.invoker("ship"));
    let create = b.add_method(
        ty,
        "create",
        Arc::new(|_, _| Err(TestFailure::failed("order rejected"))),
    );
    let audit = b.add_method(ty, "audit", journal.invoker("audit"));

    let mut table = PatternTable::new();
    table
        .attach(ship, TestMethodPattern)
        .attach(ship, DependsOnPattern::new(create))
        .attach(create, TestMethodPattern)
        .attach(audit, TestMethodPattern)
        .attach(audit, OrderPattern(-1));

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    assert!(discovery.annotations.is_empty());
    let report = session.run_all(&discovery.model);

    let order: Vec<_> = report
        .test_cases()
        .map(|result| result.step.name.as_str())
        .collect();
    assert_eq!(order, vec!["audit", "create", "ship"]);
    let ship = report.find("Sample/Orders/ship").unwrap();
    assert_eq!(ship.outcome, TestOutcome::Skipped);
    assert_eq!(ship.message.as_deref(), Some(UNSATISFIED_DEPENDENCY));
    assert_eq!(journal.entries(), vec!["audit"]);
}

#[test]
fn test_dependency_across_fixtures_reorders_the_fixtures() {
    let journal = Journal::default();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let billing = b.add_type(asm, "Billing");
    let charge = b.add_method(billing, "charge", journal.invoker("charge"));
    let inventory = b.add_type(asm, "Inventory");
    let reserve = b.add_method(inventory, "reserve", journal.invoker("reserve"));

    let mut table = PatternTable::new();
    table
        .attach(charge, TestMethodPattern)
        .attach(charge, DependsOnPattern::new(reserve))
        .attach(reserve, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    assert!(discovery.annotations.is_empty());
    let report = session.run_all(&discovery.model);

    assert_eq!(journal.entries(), vec!["reserve", "charge"]);
    let charge = report.find("Sample/Billing/charge").unwrap();
    assert_eq!(charge.outcome, TestOutcome::Passed);
}

#[test]
fn test_cancellation_stops_remaining_tests() {
    let cancel = CancellationToken::new();
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let token = cancel.clone();
    let first = b.add_method(
        ty,
        "first",
        Arc::new(move |_, _| {
            token.cancel();
            Ok(())
        }),
    );
    let second = b.add_method(ty, "second", noop());

    let mut table = PatternTable::new();
    table
        .attach(first, TestMethodPattern)
        .attach(second, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run(
        &discovery.model,
        &TestFilter::All,
        Arc::new(NullListener),
        &cancel,
    );

    assert!(cancel.is_canceled());
    assert_eq!(
        outcome_of(&discovery, &report, "Sample/Suite/second"),
        TestOutcome::Canceled
    );
    assert_eq!(report.outcome(), TestOutcome::Canceled);
    assert_eq!(report.exit_code(), 1);
}
