use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_passing_phase() {
    let sandbox = Sandbox::new(AbortSignal::new());
    assert_eq!(sandbox.run(Phase::Execute, || Ok(())), PhaseOutcome::passed());
}

#[test]
fn test_failure_keeps_outcome_and_message() {
    let sandbox = Sandbox::new(AbortSignal::new());
    let outcome = sandbox.run(Phase::SetUp, || Err(TestFailure::error("no database")));
    assert_eq!(outcome, PhaseOutcome::new(TestOutcome::Error, "no database"));
}

#[test]
fn test_panic_becomes_failed() {
    let sandbox = Sandbox::new(AbortSignal::new());
    let outcome = sandbox.run(Phase::Execute, || panic!("assertion went wrong"));
    assert_eq!(
        outcome,
        PhaseOutcome::new(TestOutcome::Failed, "assertion went wrong")
    );
}

#[test]
fn test_aborted_signal_refuses_regular_phases_only() {
    let signal = AbortSignal::new();
    signal.abort(TestOutcome::Canceled, "stop");
    let sandbox = Sandbox::new(signal);

    let mut ran = false;
    let outcome = sandbox.run(Phase::Execute, || {
        ran = true;
        Ok(())
    });
    assert!(!ran);
    assert_eq!(outcome, PhaseOutcome::new(TestOutcome::Canceled, "stop"));

    let mut finalized = false;
    let outcome = sandbox.run_finalizer(Phase::Dispose, || {
        finalized = true;
        Ok(())
    });
    assert!(finalized);
    assert_eq!(outcome, PhaseOutcome::passed());
}

#[test]
fn test_abort_during_phase_overrides_success() {
    let signal = AbortSignal::new();
    let sandbox = Sandbox::new(signal.clone());
    let outcome = sandbox.run(Phase::Execute, || {
        signal.abort(TestOutcome::Timeout, "late");
        Ok(())
    });
    assert_eq!(outcome, PhaseOutcome::new(TestOutcome::Timeout, "late"));
}

#[test]
fn test_merge_prefers_severity_then_first_message() {
    let mut outcome = PhaseOutcome::passed();
    outcome.merge(PhaseOutcome::new(TestOutcome::Failed, "first"));
    outcome.merge(PhaseOutcome::new(TestOutcome::Failed, "second"));
    assert_eq!(outcome, PhaseOutcome::new(TestOutcome::Failed, "first"));

    outcome.merge(PhaseOutcome::new(TestOutcome::Error, "worse"));
    assert_eq!(outcome, PhaseOutcome::new(TestOutcome::Error, "worse"));

    outcome.merge(PhaseOutcome::passed());
    assert_eq!(outcome.outcome, TestOutcome::Error);
}

#[test]
fn test_merge_generalized() {
    let mut outcome = PhaseOutcome::passed();
    outcome.merge_generalized(TestOutcome::Skipped);
    assert_eq!(outcome.outcome, TestOutcome::Passed);
    outcome.merge_generalized(TestOutcome::Failed);
    assert_eq!(outcome.outcome, TestOutcome::Inconclusive);
}

#[test]
fn test_watchdog_fires_after_deadline() {
    let signal = AbortSignal::new();
    let watchdog = Watchdog::arm(Duration::from_millis(20), signal.clone());
    thread::sleep(Duration::from_millis(200));
    drop(watchdog);
    let reason = signal.reason();
    assert_eq!(
        reason.map(|r| (r.outcome, r.message)),
        Some((
            TestOutcome::Timeout,
            "The test timed out after 0.02 seconds.".to_owned()
        ))
    );
}

#[test]
fn test_dropped_watchdog_never_fires() {
    let signal = AbortSignal::new();
    drop(Watchdog::arm(Duration::from_millis(20), signal.clone()));
    thread::sleep(Duration::from_millis(60));
    assert!(!signal.is_aborted());
}
