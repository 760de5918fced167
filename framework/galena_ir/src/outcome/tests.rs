use proptest::prelude::*;

use super::*;

const STATUSES: [TestOutcome; 7] = [
    TestOutcome::Passed,
    TestOutcome::Skipped,
    TestOutcome::Inconclusive,
    TestOutcome::Failed,
    TestOutcome::Error,
    TestOutcome::Timeout,
    TestOutcome::Canceled,
];

fn outcome() -> impl Strategy<Value = TestOutcome> {
    (0..STATUSES.len()).prop_map(|i| STATUSES[i])
}

#[test]
fn test_merge_examples() {
    assert_eq!(
        TestOutcome::Passed.combine(TestOutcome::Passed),
        TestOutcome::Passed
    );
    assert_eq!(
        TestOutcome::Passed.combine(TestOutcome::Inconclusive),
        TestOutcome::Inconclusive
    );
    assert_eq!(
        TestOutcome::Inconclusive.combine(TestOutcome::Failed),
        TestOutcome::Failed
    );
    assert_eq!(
        TestOutcome::Failed.combine(TestOutcome::Error),
        TestOutcome::Error
    );
}

#[test]
fn test_abort_statuses_dominate_failed() {
    for status in [
        TestOutcome::Error,
        TestOutcome::Timeout,
        TestOutcome::Canceled,
    ] {
        assert_eq!(TestOutcome::Failed.combine(status), status);
        assert_eq!(status.combine(TestOutcome::Inconclusive), status);
    }
}

#[test]
fn test_generalize() {
    assert_eq!(TestOutcome::Passed.generalize(), TestOutcome::Passed);
    assert_eq!(TestOutcome::Skipped.generalize(), TestOutcome::Passed);
    assert_eq!(TestOutcome::Failed.generalize(), TestOutcome::Inconclusive);
    assert_eq!(TestOutcome::Timeout.generalize(), TestOutcome::Inconclusive);
    assert_eq!(
        TestOutcome::Inconclusive.generalize(),
        TestOutcome::Inconclusive
    );
}

#[test]
fn test_failure_display() {
    let failure = TestFailure::failed("expected 2, got 3");
    assert_eq!(failure.to_string(), "failed: expected 2, got 3");
    assert!(failure.outcome.is_failure());
    assert!(!TestOutcome::Skipped.is_failure());
}

proptest! {
    #[test]
    fn combine_is_commutative(a in outcome(), b in outcome()) {
        prop_assert_eq!(a.combine(b), b.combine(a));
    }

    #[test]
    fn combine_is_associative(a in outcome(), b in outcome(), c in outcome()) {
        prop_assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
    }

    #[test]
    fn passed_is_identity(a in outcome()) {
        prop_assert_eq!(TestOutcome::Passed.combine(a), a);
        prop_assert_eq!(a.combine(a), a);
    }

    #[test]
    fn generalize_never_raises_above_inconclusive(a in outcome()) {
        prop_assert!(a.generalize() <= TestOutcome::Inconclusive);
    }
}
