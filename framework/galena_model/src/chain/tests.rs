use galena_ir::{TestFailure, TestOutcome};
use pretty_assertions::assert_eq;

use super::*;

type Log = Vec<&'static str>;

fn push(tag: &'static str) -> impl Fn(&mut Log) -> PhaseResult + Send + Sync + 'static {
    move |log: &mut Log| {
        log.push(tag);
        Ok(())
    }
}

#[test]
fn test_empty_chain_is_noop() {
    let chain: ActionChain<Log> = ActionChain::new();
    let mut log = Log::new();
    assert!(chain.call(&mut log).is_ok());
    assert!(log.is_empty());
    assert!(chain.is_empty());
}

#[test]
fn test_before_and_after_order() {
    let mut chain = ActionChain::new();
    chain.after(push("b"));
    chain.before(push("a"));
    chain.after(push("c"));
    chain.before(push("first"));

    let mut log = Log::new();
    chain.call(&mut log).unwrap();
    assert_eq!(log, vec!["first", "a", "b", "c"]);
    assert_eq!(chain.len(), 4);
}

#[test]
fn test_composing_does_not_execute() {
    let mut chain = ActionChain::<Log>::new();
    chain.after(|_| panic!("ran during composition"));
    chain.before(push("x"));
    // Nothing ran yet; composing must be inert.
    assert_eq!(chain.len(), 2);
}

#[test]
fn test_failure_short_circuits() {
    let mut chain = ActionChain::new();
    chain.after(push("a"));
    chain.after(|_: &mut Log| Err(TestFailure::failed("boom")));
    chain.after(push("never"));

    let mut log = Log::new();
    let err = chain.call(&mut log).unwrap_err();
    assert_eq!(err.outcome, TestOutcome::Failed);
    assert_eq!(log, vec!["a"]);
}

#[test]
fn test_around_wraps_inner() {
    let mut chain = ActionChain::new();
    chain.after(push("body"));
    chain.around(|log: &mut Log, inner| {
        log.push("enter");
        let result = inner(log);
        log.push("exit");
        result
    });

    let mut log = Log::new();
    chain.call(&mut log).unwrap();
    assert_eq!(log, vec!["enter", "body", "exit"]);
}

#[test]
fn test_around_can_swallow_failure() {
    let mut chain = ActionChain::new();
    chain.after(|_: &mut Log| Err(TestFailure::failed("expected")));
    chain.around(|log: &mut Log, inner| match inner(log) {
        Err(failure) if failure.message == "expected" => Ok(()),
        other => other,
    });

    assert!(chain.call(&mut Log::new()).is_ok());
}

#[test]
fn test_set_and_clear() {
    let mut chain = ActionChain::new();
    chain.after(push("a"));
    chain.after(push("b"));
    chain.set(push("only"));

    let mut log = Log::new();
    chain.call(&mut log).unwrap();
    assert_eq!(log, vec!["only"]);

    chain.clear();
    assert!(chain.is_empty());
}

#[test]
fn test_clone_is_independent() {
    let mut original = ActionChain::new();
    original.after(push("base"));

    let mut decorated = original.clone();
    decorated.before(push("extra"));

    let mut log = Log::new();
    original.call(&mut log).unwrap();
    assert_eq!(log, vec!["base"]);

    log.clear();
    decorated.call(&mut log).unwrap();
    assert_eq!(log, vec!["extra", "base"]);
}

#[test]
fn test_decorator_chain_passes_both_arguments() {
    let mut chain: DecoratorChain<Log, Log> = DecoratorChain::new();
    chain.after(|parent, child| {
        parent.push("parent");
        child.push("child");
        Ok(())
    });
    chain.before(|parent, _| {
        parent.push("first");
        Ok(())
    });

    let mut parent = Log::new();
    let mut child = Log::new();
    chain.call(&mut parent, &mut child).unwrap();
    assert_eq!(parent, vec!["first", "parent"]);
    assert_eq!(child, vec!["child"]);
}
