use super::*;

#[test]
fn fraction_is_clamped_and_optional() {
    assert_eq!(Progress { done: 5, total: 10 }.fraction(), Some(0.5));
    assert_eq!(Progress { done: 12, total: 10 }.fraction(), Some(1.0));
    assert_eq!(Progress { done: 3, total: 0 }.fraction(), None);
}

#[test]
fn closures_are_observers() {
    let mut seen = Vec::new();
    {
        let mut obs = |p: Progress| seen.push(p.done);
        obs.on_progress(Progress { done: 1, total: 2 });
        obs.on_progress(Progress { done: 2, total: 2 });
    }
    assert_eq!(seen, vec![1, 2]);
}

#[test]
fn tracing_observer_advances_in_steps() {
    let mut obs = TracingProgress::new("test");
    obs.on_progress(Progress { done: 1, total: 100 });
    assert_eq!(obs.last_step, Some(0));
    obs.on_progress(Progress { done: 9, total: 100 });
    assert_eq!(obs.last_step, Some(0));
    obs.on_progress(Progress { done: 35, total: 100 });
    assert_eq!(obs.last_step, Some(3));
    obs.on_progress(Progress { done: 100, total: 100 });
    assert_eq!(obs.last_step, Some(10));
}

#[test]
fn cancel_is_shared_between_clones() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!other.is_cancelled());
    token.cancel();
    assert!(other.is_cancelled());
}
