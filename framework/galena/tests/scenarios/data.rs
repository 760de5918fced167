use std::sync::Arc;

use pretty_assertions::assert_eq;

use galena::builtins::{BindPattern, DataSourcePattern, RowPattern, TestMethodPattern};
use galena::{CatalogBuilder, PatternTable, TestFailure, TestOutcome, Value};
use galena_ir::ValueType;
use galena_model::DataRow;

use crate::common::{outcome_of, session};

#[test]
fn test_rows_run_as_named_instances() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Math");
    let add = b.add_method(
        ty,
        "add",
        Arc::new(|_, args| match (args[0].as_int(), args[1].as_int()) {
            (Some(x), Some(y)) if x + y < 5 => Ok(()),
            (Some(x), Some(y)) => Err(TestFailure::failed(format!("{x} + {y} is too large"))),
            _ => Err(TestFailure::error("expected integers")),
        }),
    );
    b.add_parameter(add, "x", ValueType::Int);
    b.add_parameter(add, "y", ValueType::Int);

    let mut table = PatternTable::new();
    table
        .attach(add, TestMethodPattern)
        .attach(add, RowPattern::new(vec![Value::Int(1), Value::Int(2)]))
        .attach(add, RowPattern::new(vec![Value::Int(3), Value::Int(4)]));

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run_all(&discovery.model);

    let first = report.find("Sample/Math/add(1, 2)").unwrap();
    assert_eq!(first.outcome, TestOutcome::Passed);
    assert!(first.step.is_test_case);
    assert!(!first.step.is_primary);
    let second = report.find("Sample/Math/add(3, 4)").unwrap();
    assert_eq!(second.outcome, TestOutcome::Failed);
    assert_eq!(second.message.as_deref(), Some("3 + 4 is too large"));

    // The parameterized test itself only summarizes its instances.
    assert_eq!(
        outcome_of(&discovery, &report, "Sample/Math/add"),
        TestOutcome::Inconclusive
    );
    let add = discovery.find("Sample/Math/add").unwrap();
    assert_eq!(report.instances_of(add).count(), 2);
    assert_eq!(report.test_case_count(), 2);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_parameter_without_data_is_an_error() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Math");
    let negate = b.add_method(ty, "negate", Arc::new(|_, _| Ok(())));
    b.add_parameter(negate, "x", ValueType::Int);

    let mut table = PatternTable::new();
    table.attach(negate, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let report = session.run_all(&discovery.model);

    let negate = report.find("Sample/Math/negate").unwrap();
    assert_eq!(negate.outcome, TestOutcome::Error);
    assert!(negate
        .message
        .as_deref()
        .unwrap()
        .contains("no anonymous data source found for the implicit binding of 'x'"));
}

#[test]
fn test_named_source_binds_by_path() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Auth");
    let login = b.add_method(
        ty,
        "login",
        Arc::new(|_, args| match args.first().and_then(Value::as_str) {
            Some("ada" | "grace") => Ok(()),
            other => Err(TestFailure::failed(format!("unknown user {other:?}"))),
        }),
    );
    let user = b.add_parameter(login, "user", ValueType::Str);

    let users = vec![
        DataRow::default().with_named("name", Value::from("ada")),
        DataRow::default().with_named("name", Value::from("grace")),
    ];
    let mut table = PatternTable::new();
    table
        .attach(login, TestMethodPattern)
        .attach(login, DataSourcePattern::new("users", users));
    table
        .attach(user, BindPattern::source("users"))
        .attach(user, BindPattern::path("name"));

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    assert!(!discovery.has_errors());
    let report = session.run_all(&discovery.model);

    let names: Vec<_> = report
        .test_cases()
        .map(|result| (result.step.full_name.as_str(), result.outcome))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Sample/Auth/login(\"ada\")", TestOutcome::Passed),
            ("Sample/Auth/login(\"grace\")", TestOutcome::Passed),
        ]
    );
    assert_eq!(report.exit_code(), 0);
}
