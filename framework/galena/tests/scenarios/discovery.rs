use pretty_assertions::assert_eq;

use galena::builtins::{LifecycleMethodPattern, MetadataPattern, TestMethodPattern};
use galena::{AnnotationCode, CatalogBuilder, PatternTable, Severity, TestOutcome};

use crate::common::{noop, outcome_of, session};

#[test]
fn test_conflicting_primaries_are_reported_and_skipped() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let confused = b.add_method(ty, "confused", noop());
    let fine = b.add_method(ty, "fine", noop());

    let mut table = PatternTable::new();
    table
        .attach(confused, TestMethodPattern)
        .attach(confused, LifecycleMethodPattern::set_up())
        .attach(fine, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);

    assert!(discovery.has_errors());
    let errors: Vec<_> = discovery
        .errors()
        .map(|annotation| (annotation.code, annotation.element))
        .collect();
    assert_eq!(errors, vec![(AnnotationCode::G0001, Some(confused))]);
    assert_eq!(discovery.annotations[0].severity, Severity::Error);
    assert!(discovery.find("Sample/Suite/confused").is_none());

    // The rest of the fixture is unaffected.
    let report = session.run_all(&discovery.model);
    assert_eq!(
        outcome_of(&discovery, &report, "Sample/Suite/fine"),
        TestOutcome::Passed
    );
    assert_eq!(report.test_case_count(), 1);
}

#[test]
fn test_misapplied_pattern_is_a_usage_error() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let nested = b.add_type(ty, "Nested");
    let m = b.add_method(ty, "m", noop());

    let mut table = PatternTable::new();
    table
        .attach(nested, TestMethodPattern)
        .attach(m, TestMethodPattern);

    let session = session(b.build(), table);
    let discovery = session.discover(&[asm]);
    let codes: Vec<_> = discovery.errors().map(|annotation| annotation.code).collect();
    assert_eq!(codes, vec![AnnotationCode::G0002]);
    assert!(discovery.find("Sample/Suite/m").is_some());
}

#[test]
fn test_assemblies_share_one_model() {
    let mut b = CatalogBuilder::new();
    let mut elements = Vec::new();
    for name in ["Core", "Web"] {
        let asm = b.add_assembly(name);
        let ty = b.add_type(asm, "Smoke");
        let m = b.add_method(ty, "starts", noop());
        elements.push((asm, m));
    }
    let mut table = PatternTable::new();
    for &(_, m) in &elements {
        table
            .attach(m, TestMethodPattern)
            .attach(m, MetadataPattern::category("smoke"));
    }

    let session = session(b.build(), table);
    let assemblies: Vec<_> = elements.iter().map(|&(asm, _)| asm).collect();
    let discovery = session.discover(&assemblies);
    assert!(discovery.annotations.is_empty());

    let core = discovery.find("Core/Smoke/starts").unwrap();
    let web = discovery.find("Web/Smoke/starts").unwrap();
    assert_eq!(discovery.model.test(core).stable_id, "Core/Smoke/starts");
    assert_ne!(
        discovery.model.test(core).stable_id,
        discovery.model.test(web).stable_id
    );

    let report = session.run_all(&discovery.model);
    assert_eq!(report.count(TestOutcome::Passed), 2);
    assert_eq!(report.to_string(), "2 test cases: 2 passed, 0 failed, 0 skipped, 0 inconclusive");
}
