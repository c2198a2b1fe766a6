mod util;

use std::cell::RefCell;
use std::rc::Rc;
use tubes::{BoxError, Drain, Error, Fount, In, Out, Outputs, Siphon, StopReason, Thru, Tube};
use util::{Events, FakeDrain, FakeFount, attach, init_log};

struct Doubler;

impl Tube for Doubler {
    type Input = u32;
    type Output = u32;

    fn received(&mut self, item: u32) -> Result<Outputs<u32>, BoxError> {
        Ok(Outputs::from(vec![item, item]))
    }
}

struct AddTen;

impl Tube for AddTen {
    type Input = u32;
    type Output = u32;

    fn received(&mut self, item: u32) -> Result<Outputs<u32>, BoxError> {
        Ok(Outputs::one(item + 10))
    }
}

/// Records, in order, which drain saw which item.
fn tagged(
    log: &Rc<RefCell<Vec<(&'static str, &'static str)>>>,
    tag: &'static str,
) -> Rc<FakeDrain<&'static str>> {
    let drain = FakeDrain::new();
    let log = Rc::clone(log);
    drain.on_receive(move |item| log.borrow_mut().push((tag, *item)));
    drain
}

#[test]
fn fan_out_broadcasts_in_attachment_order() {
    init_log();
    let out = Out::<&'static str>::new();
    let source = FakeFount::<&'static str>::new();
    source.flow_to(Some(out.drain())).unwrap();

    let log = Rc::new(RefCell::new(vec![]));
    let first = tagged(&log, "first");
    let second = tagged(&log, "second");
    out.new_fount().flow_to(Some(first.clone())).unwrap();
    out.new_fount().flow_to(Some(second.clone())).unwrap();
    // Branch with nothing attached is skipped.
    let _idle = out.new_fount();

    source.deliver("a");
    assert_eq!(*log.borrow(), vec![("first", "a"), ("second", "a")]);

    source.finish(StopReason::Finished);
    assert_eq!(first.stop_count(), 1);
    assert_eq!(second.stop_count(), 1);
}

#[test]
fn fan_out_branch_stopping_mid_broadcast_is_skipped() {
    init_log();
    let out = Out::<&'static str>::new();
    let first = FakeDrain::<&'static str>::new();
    let second = FakeDrain::<&'static str>::new();
    let third = FakeDrain::<&'static str>::new();
    out.new_fount().flow_to(Some(first.clone())).unwrap();
    let second_fount = out.new_fount();
    second_fount.flow_to(Some(second.clone())).unwrap();
    out.new_fount().flow_to(Some(third.clone())).unwrap();

    first.on_receive(move |_item| second_fount.stop_flow());
    out.drain().receive("a");

    assert_eq!(first.items(), vec!["a"]);
    assert!(second.items().is_empty());
    assert_eq!(third.items(), vec!["a"]);
    assert_eq!(out.branch_count(), 2);

    out.drain().receive("b");
    assert!(second.items().is_empty());
    assert_eq!(third.items(), vec!["a", "b"]);
}

#[test]
fn fan_out_pauses_upstream_once_for_all_branches() {
    init_log();
    let out = Out::<&'static str>::new();
    let source = FakeFount::<&'static str>::new();
    source.flow_to(Some(out.drain())).unwrap();
    let left = out.new_fount();
    let right = out.new_fount();

    let left_pause = left.pause_flow().unwrap();
    assert_eq!(source.pause_calls(), 1);
    assert_eq!(left.pause_flow().unwrap_err(), Error::AlreadyPaused);

    let right_pause = right.pause_flow().unwrap();
    assert_eq!(source.pause_calls(), 1);

    left_pause.unpause();
    assert!(source.is_paused());
    right_pause.unpause();
    assert!(!source.is_paused());

    // A released branch may pause again.
    let again = left.pause_flow().unwrap();
    assert_eq!(source.pause_calls(), 2);
    again.unpause();
    assert!(!source.is_paused());
}

#[test]
fn fan_out_hands_its_pause_to_a_new_upstream() {
    init_log();
    let out = Out::<&'static str>::new();
    let old = FakeFount::<&'static str>::new();
    old.flow_to(Some(out.drain())).unwrap();
    let branch = out.new_fount();
    let pause = branch.pause_flow().unwrap();
    assert!(old.is_paused());

    let new = FakeFount::<&'static str>::new();
    new.flow_to(Some(out.drain())).unwrap();
    assert!(new.is_paused());
    assert!(!old.is_paused());
    assert!(old.drain().is_none());

    pause.unpause();
    assert!(!new.is_paused());
}

#[test]
fn fan_out_detached_upstream_gets_its_pause_back() {
    init_log();
    let out = Out::<&'static str>::new();
    let old = FakeFount::<&'static str>::new();
    old.flow_to(Some(out.drain())).unwrap();
    let pause = out.new_fount().pause_flow().unwrap();
    assert!(old.is_paused());

    old.flow_to(None).unwrap();
    assert!(!old.is_paused());
    assert!(out.drain().fount().is_none());

    // Still paused on behalf of the branch: the next upstream is held too.
    let next = FakeFount::<&'static str>::new();
    next.flow_to(Some(out.drain())).unwrap();
    assert!(next.is_paused());
    pause.unpause();
    assert!(!next.is_paused());
    assert_eq!(old.outstanding(), 0);
}

#[test]
fn fan_in_holds_branches_paused_until_a_drain_attaches() {
    init_log();
    let fan_in = In::<u32>::new();
    let left = FakeFount::<u32>::new();
    let right = FakeFount::<u32>::new();
    left.flow_to(Some(fan_in.new_drain())).unwrap();
    right.flow_to(Some(fan_in.new_drain())).unwrap();
    assert!(left.is_paused());
    assert!(right.is_paused());

    let drain = FakeDrain::<u32>::new();
    fan_in.fount().flow_to(Some(drain.clone())).unwrap();
    assert!(!left.is_paused());
    assert!(!right.is_paused());

    left.deliver(1);
    right.deliver(2);
    left.deliver(3);
    assert_eq!(drain.items(), vec![1, 2, 3]);
}

#[test]
fn fan_in_pause_and_stop_reach_every_attached_branch() {
    init_log();
    let fan_in = In::<u32>::new();
    let drain = FakeDrain::<u32>::new();
    fan_in.fount().flow_to(Some(drain.clone())).unwrap();

    let sources: Vec<_> = (0..3).map(|_| FakeFount::<u32>::new()).collect();
    for source in &sources {
        source.flow_to(Some(fan_in.new_drain())).unwrap();
    }
    assert_eq!(fan_in.branch_count(), 3);

    let pause = fan_in.fount().pause_flow().unwrap();
    assert!(sources.iter().all(|source| source.pause_calls() == 1));
    pause.unpause();
    assert!(sources.iter().all(|source| !source.is_paused()));

    // A detached branch no longer takes part.
    sources[2].flow_to(None).unwrap();
    let pause = fan_in.fount().pause_flow().unwrap();
    assert_eq!(sources[2].pause_calls(), 1);
    pause.unpause();

    fan_in.fount().stop_flow();
    let stops: Vec<_> = sources.iter().map(|source| source.stop_calls()).collect();
    assert_eq!(stops, vec![1, 1, 0]);
}

#[test]
fn fan_in_pause_rolls_back_when_a_branch_refuses() {
    init_log();
    let fan_in = In::<u32>::new();
    let drain = FakeDrain::<u32>::new();
    fan_in.fount().flow_to(Some(drain.clone())).unwrap();

    let source = FakeFount::<u32>::new();
    source.flow_to(Some(fan_in.new_drain())).unwrap();
    // A fan-out branch that already holds its one pause refuses another.
    let out = Out::<u32>::new();
    let refusing = out.new_fount();
    let held = refusing.pause_flow().unwrap();
    refusing.flow_to(Some(fan_in.new_drain())).unwrap();

    let err = fan_in.fount().pause_flow().unwrap_err();
    assert_eq!(err, Error::AlreadyPaused);
    assert_eq!(source.pause_calls(), 1);
    assert!(!source.is_paused());

    held.unpause();
    let pause = fan_in.fount().pause_flow().unwrap();
    assert!(source.is_paused());
    pause.unpause();
    assert!(!source.is_paused());
}

#[test]
fn fan_in_pauses_a_new_upstream_before_releasing_the_old() {
    init_log();
    let events = Events::default();
    let fan_in = In::<u32>::new();
    let branch = fan_in.new_drain();
    let old = FakeFount::<u32>::new();
    let new = FakeFount::<u32>::new();
    old.record_into("old", &events);
    new.record_into("new", &events);

    old.flow_to(Some(branch.clone())).unwrap();
    assert!(old.is_paused());
    new.flow_to(Some(branch)).unwrap();

    assert_eq!(*events.borrow(), vec!["pause old", "pause new", "resume old"]);
    assert!(new.is_paused());
    assert!(!old.is_paused());
    assert!(old.drain().is_none());

    let drain = FakeDrain::<u32>::new();
    fan_in.fount().flow_to(Some(drain.clone())).unwrap();
    assert!(!new.is_paused());
    new.deliver(5);
    assert_eq!(drain.items(), vec![5]);
}

#[test]
fn fan_in_relays_each_branch_stop() {
    init_log();
    let fan_in = In::<u32>::new();
    let drain = FakeDrain::<u32>::new();
    fan_in.fount().flow_to(Some(drain.clone())).unwrap();
    let source = FakeFount::<u32>::new();
    source.flow_to(Some(fan_in.new_drain())).unwrap();

    source.finish(StopReason::lost("gone"));
    assert_eq!(drain.stop_count(), 1);
}

#[test]
fn thru_scatters_and_gathers() {
    init_log();
    let thru = Thru::<u32, u32>::new(vec![
        Siphon::new(Doubler).as_drain(),
        Siphon::new(AddTen).as_drain(),
    ]);
    let source = FakeFount::<u32>::new();
    let thru_drain: Rc<dyn Drain<u32>> = thru.clone();
    let merged: Rc<dyn Fount<u32>> = attach(&*source, thru_drain);
    assert!(source.is_paused());

    let drain = FakeDrain::<u32>::new();
    merged.flow_to(Some(drain.clone())).unwrap();
    assert!(!source.is_paused());

    source.deliver(1);
    source.deliver(2);
    assert_eq!(drain.items(), vec![1, 1, 11, 2, 2, 12]);

    let pause = merged.pause_flow().unwrap();
    assert!(source.is_paused());
    assert_eq!(source.pause_calls(), 2);
    pause.unpause();
    assert!(!source.is_paused());
}

#[test]
fn thru_reports_unexpected_branch_output_types() {
    init_log();
    let thru = Thru::<u32, String>::new(vec![Siphon::new(Doubler).as_drain()]);
    let source = FakeFount::<u32>::new();
    let drain: Rc<dyn Drain<u32>> = thru;

    let err = source.flow_to(Some(drain)).unwrap_err();
    assert!(matches!(err, Error::UnexpectedFount { .. }));
}
