//! # Siphon - Connecting a Tube Between a Fount and a Drain
//!
//! A [`Siphon`] wraps one [`Tube`] and is both the [`Drain`] that the upstream
//! fount delivers into and the [`Fount`] that the downstream drain receives
//! from. It owns everything needed to make a tube behave well in a flow:
//!
//! - the buffered queue of not-yet-delivered output sequences
//! - pause bookkeeping in both directions: while any downstream pause is
//!   outstanding, delivery is suspended and the upstream is paused once
//! - the tube's lifecycle: `started` on first attachment, `received` per item,
//!   `stopped` once at the end
//! - failure handling: an error from a hook stops the upstream and is
//!   reported downstream exactly once
//!
//! ## Delivery
//!
//! ```text
//!   receive(item) ─> tube.received(item) ─> append to queue ─> unbuffer
//!                                                                  │
//!      downstream.receive(value) <─ Ready(value) <─ next value ────┤
//!      pause, wait, prepend result <─ Pending(deferred) <──────────┤
//!      stop here <─ queue suspended ───────────────────────────────┤
//!      downstream.flow_stopped(reason) <─ queue exhausted + stop ──┘
//! ```
//!
//! Unbuffering is not reentrant: if delivering a value to the downstream
//! synchronously leads to more output (a drain that feeds back into the same
//! siphon), the nested attempt returns at once and the outer loop picks the new
//! values up. The stack never grows with the depth of the buffer.

use crate::buffer::{BufferedQueue, Next};
use crate::error::{BoxError, Failure, Result, StopReason};
use crate::flow::{
    Drain, DrainSlot, Fount, FountSlot, NextFount, begin_flowing_from, begin_flowing_to,
    downstream_of, same, upstream_of,
};
use crate::pause::{FlowState, Pause};
use crate::tube::{Outputs, Tube, Value};
use log::{debug, error, trace, warn};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct SiphonState<T> {
    pending: BufferedQueue<T>,
    flow: FlowState,
    /// Held because someone downstream asked us to pause.
    pause_because_pause_called: Option<Pause>,
    /// Held because there is output but nowhere to deliver it.
    pause_because_no_drain: Option<Pause>,
    can_still_process_input: bool,
    can_still_produce_output: bool,
    ever_started: bool,
    unbuffering: bool,
    flow_stopping_reason: Option<StopReason>,
    failed: bool,
    finished: bool,
}

/// Adapts a [`Tube`] into a connected fount and drain pair.
///
/// Create one with [`Siphon::new`] and connect it like any other drain or
/// fount:
///
/// ```rust
/// # use tubes::{BoxError, Drain, Fount, Outputs, Siphon, Tube};
/// # use std::rc::Rc;
/// struct Upper;
///
/// impl Tube for Upper {
///     type Input = String;
///     type Output = String;
///
///     fn received(&mut self, item: String) -> Result<Outputs<String>, BoxError> {
///         Ok(Outputs::one(item.to_uppercase()))
///     }
/// }
///
/// let siphon = Siphon::new(Upper);
/// let drain: Rc<dyn Drain<String>> = siphon.clone();
/// let fount: Rc<dyn Fount<String>> = siphon;
/// assert!(drain.fount().is_none());
/// assert!(fount.drain().is_none());
/// ```
pub struct Siphon<Tb: Tube> {
    me: Weak<Siphon<Tb>>,
    name: String,
    input_type: Option<&'static str>,
    output_type: Option<&'static str>,
    tube: RefCell<Tb>,
    upstream: FountSlot<Tb::Input>,
    downstream: DrainSlot<Tb::Output>,
    state: RefCell<SiphonState<Tb::Output>>,
}

impl<Tb: Tube> Siphon<Tb> {
    /// Wraps `tube` in a new siphon.
    pub fn new(tube: Tb) -> Rc<Self> {
        Rc::new_cyclic(|me| Siphon {
            me: me.clone(),
            name: tube.name().to_owned(),
            input_type: tube.input_type(),
            output_type: tube.output_type(),
            tube: RefCell::new(tube),
            upstream: RefCell::new(None),
            downstream: RefCell::new(None),
            state: RefCell::new(SiphonState {
                pending: BufferedQueue::new(),
                flow: FlowState::Unpaused,
                pause_because_pause_called: None,
                pause_because_no_drain: None,
                can_still_process_input: true,
                can_still_produce_output: true,
                ever_started: false,
                unbuffering: false,
                flow_stopping_reason: None,
                failed: false,
                finished: false,
            }),
        })
    }

    /// The tube's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This siphon viewed as the drain its upstream delivers into.
    pub fn as_drain(&self) -> Rc<dyn Drain<Tb::Input>> {
        self.this()
    }

    /// This siphon viewed as the fount its downstream receives from.
    pub fn as_fount(&self) -> Rc<dyn Fount<Tb::Output>> {
        self.this()
    }

    /// Current downstream pause bookkeeping.
    pub fn flow_state(&self) -> FlowState {
        self.state.borrow().flow
    }

    fn this(&self) -> Rc<Self> {
        match self.me.upgrade() {
            Some(this) => this,
            None => panic!("siphon for {} used while being dropped", self.name),
        }
    }

    /// Runs one tube hook and buffers whatever it yields.
    fn deliver_from(
        &self,
        hook: &str,
        produce: impl FnOnce(&mut Tb) -> std::result::Result<Outputs<Tb::Output>, BoxError>,
    ) {
        let produced = {
            let mut tube = self.tube.borrow_mut();
            produce(&mut tube)
        };
        let outputs = match produced {
            Ok(outputs) => outputs,
            Err(err) => {
                self.fail(Failure::new(format!("{}::{}", self.name, hook), err));
                return;
            }
        };
        let Some(sequence) = outputs.into_sequence() else {
            return;
        };

        let needs_pause = {
            let mut state = self.state.borrow_mut();
            if !state.can_still_produce_output {
                trace!("{} discarding output from {} after output closed", self.name, hook);
                return;
            }
            state.pending.append(sequence);
            self.downstream.borrow().is_none() && state.pause_because_no_drain.is_none()
        };
        if needs_pause && !self.pause_for_no_drain(hook) {
            return;
        }
        self.unbuffer();
    }

    /// Pauses because output is waiting and there is no drain; returns
    /// `false` if the siphon failed instead.
    fn pause_for_no_drain(&self, context: &str) -> bool {
        match self.pause_flow() {
            Ok(pause) => {
                let mut state = self.state.borrow_mut();
                if let Some(stale) = state.pause_because_no_drain.replace(pause) {
                    drop(state);
                    stale.unpause();
                }
                true
            }
            Err(err) => {
                self.fail(Failure::new(format!("{}::{}", self.name, context), err));
                false
            }
        }
    }

    /// Delivers buffered values for as long as the flow allows.
    fn unbuffer(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.unbuffering {
                return;
            }
            state.unbuffering = true;
        }

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                if state.can_still_produce_output {
                    state.pending.next()
                } else {
                    Next::Exhausted
                }
            };
            match next {
                Next::Paused => break,
                Next::Exhausted => {
                    self.maybe_end_of_line();
                    break;
                }
                Next::Value(Value::Pending(deferred)) => {
                    let pause = match self.pause_flow() {
                        Ok(pause) => pause,
                        Err(err) => {
                            self.fail(Failure::new(format!("{}::pending", self.name), err));
                            continue;
                        }
                    };
                    let me = self.me.clone();
                    deferred.when_done(move |result| match me.upgrade() {
                        Some(siphon) => siphon.when_unclogged(result, pause),
                        None => pause.unpause(),
                    });
                }
                Next::Value(Value::Ready(item)) => {
                    let downstream = downstream_of(&self.downstream);
                    match downstream {
                        Some(drain) => drain.receive(item),
                        None => {
                            // The drain went away mid-flow: park the value until
                            // a new one attaches.
                            self.state.borrow_mut().pending.prepend(Value::Ready(item));
                            let waiting = self.state.borrow().pause_because_no_drain.is_some();
                            if !waiting {
                                self.pause_for_no_drain("unbuffer");
                            }
                            break;
                        }
                    }
                }
            }
        }

        self.state.borrow_mut().unbuffering = false;
    }

    /// A pending value completed: deliver it before anything buffered after it.
    fn when_unclogged(&self, result: std::result::Result<Tb::Output, BoxError>, pause: Pause) {
        match result {
            Ok(item) => {
                self.state.borrow_mut().pending.prepend(Value::Ready(item));
                pause.unpause();
            }
            Err(err) => {
                self.fail(Failure::new(format!("{}::pending", self.name), err));
                pause.unpause();
            }
        }
    }

    /// Sends the deferred stop notification once everything before it has
    /// been delivered and there is a drain to tell.
    fn maybe_end_of_line(&self) {
        let reason = {
            let mut state = self.state.borrow_mut();
            if state.finished || self.downstream.borrow().is_none() {
                return;
            }
            let Some(reason) = state.flow_stopping_reason.take() else {
                return;
            };
            state.finished = true;
            state.can_still_process_input = false;
            state.can_still_produce_output = false;
            state.pending.clear();
            state.pending.resume();
            state.flow.stop();
            reason
        };
        self.release_held_pauses();
        debug!("{} reached end of line: {}", self.name, reason);
        if let Some(drain) = downstream_of(&self.downstream) {
            drain.flow_stopped(reason);
        }
    }

    /// Lets go of every pause this siphon holds once it has stopped.
    fn release_held_pauses(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            [
                state.pause_because_pause_called.take(),
                state.pause_because_no_drain.take(),
            ]
        };
        for pause in held.into_iter().flatten() {
            pause.unpause();
        }
    }

    /// A hook failed: stop upstream and report the failure downstream, once.
    fn fail(&self, failure: Failure) {
        {
            let mut state = self.state.borrow_mut();
            if state.failed || state.finished {
                debug!("{} already ended, ignoring {}", self.name, failure);
                return;
            }
            error!("{}", failure);
            state.failed = true;
            state.can_still_process_input = false;
            state.can_still_produce_output = false;
            state.pending.clear();
            state.pending.resume();
            state.flow.stop();
            state.flow_stopping_reason = Some(StopReason::Failed(failure));
        }
        if let Some(fount) = upstream_of(&self.upstream) {
            fount.stop_flow();
        }
        self.release_held_pauses();
        self.unbuffer();
    }

    /// Suspends delivery, and pauses the upstream if there is one.
    fn actually_pause(&self) -> Result<()> {
        let upstream = {
            let mut state = self.state.borrow_mut();
            state.pending.suspend();
            if state.pause_because_pause_called.is_some() {
                // Still holding the upstream from before the last resume.
                return Ok(());
            }
            upstream_of(&self.upstream)
        };
        if let Some(fount) = upstream {
            let pause = fount.pause_flow()?;
            self.state.borrow_mut().pause_because_pause_called = Some(pause);
        }
        Ok(())
    }

    /// The last outstanding pause was released.
    fn actually_resume(&self) {
        self.state.borrow_mut().pending.resume();
        self.unbuffer();
        let held = {
            let mut state = self.state.borrow_mut();
            if state.flow.is_paused() {
                // Delivery paused us again; keep the upstream paused too.
                None
            } else {
                state.pause_because_pause_called.take()
            }
        };
        if let Some(pause) = held {
            pause.unpause();
        }
    }

    fn release_pause(&self) {
        let resume = self.state.borrow_mut().flow.release();
        if resume {
            self.actually_resume();
        }
    }
}

impl<Tb: Tube> Drain<Tb::Input> for Siphon<Tb> {
    fn input_type(&self) -> Option<&'static str> {
        self.input_type
    }

    fn fount(&self) -> Option<Rc<dyn Fount<Tb::Input>>> {
        upstream_of(&self.upstream)
    }

    fn flowing_from(
        &self,
        fount: Option<Rc<dyn Fount<Tb::Input>>>,
    ) -> Result<Option<NextFount>> {
        let previous = upstream_of(&self.upstream);
        begin_flowing_from(self, &self.upstream, fount.as_ref())?;

        let unchanged = match (&previous, &fount) {
            (Some(previous), Some(fount)) => same(previous, fount),
            (None, None) => true,
            _ => false,
        };
        let paused = self.state.borrow().flow.is_paused();
        if paused && !unchanged {
            // Hand our pause over to the new upstream before letting go of
            // the old one.
            let replacement = match &fount {
                Some(fount) => fount.pause_flow()?,
                None => Pause::placeholder(),
            };
            let stale = self
                .state
                .borrow_mut()
                .pause_because_pause_called
                .replace(replacement);
            if let Some(stale) = stale {
                stale.unpause();
            }
        }

        if let Some(fount) = &fount {
            let (closed, start) = {
                let mut state = self.state.borrow_mut();
                let start = !state.ever_started;
                state.ever_started = true;
                (!state.can_still_process_input, start)
            };
            if closed {
                fount.stop_flow();
            }
            if start {
                debug!("{} started", self.name);
                self.deliver_from("started", |tube| tube.started());
            }
        }

        let this = self.as_fount();
        match this.drain() {
            None => Ok(Some(NextFount::new(this))),
            Some(drain) => this.flow_to(Some(drain)),
        }
    }

    fn receive(&self, item: Tb::Input) {
        let accepting = self.state.borrow().can_still_process_input;
        if !accepting {
            warn!("{} dropping an item received after its input closed", self.name);
            return;
        }
        self.deliver_from("received", move |tube| tube.received(item));
    }

    fn flow_stopped(&self, reason: StopReason) {
        {
            let mut state = self.state.borrow_mut();
            if state.failed || state.finished || state.flow_stopping_reason.is_some() {
                debug!("{} ignoring flow_stopped after termination: {}", self.name, reason);
                return;
            }
            state.can_still_process_input = false;
            state.flow_stopping_reason = Some(reason.clone());
        }
        self.deliver_from("stopped", |tube| tube.stopped(&reason));
        self.unbuffer();
    }
}

impl<Tb: Tube> Fount<Tb::Output> for Siphon<Tb> {
    fn output_type(&self) -> Option<&'static str> {
        self.output_type
    }

    fn drain(&self) -> Option<Rc<dyn Drain<Tb::Output>>> {
        downstream_of(&self.downstream)
    }

    fn flow_to(&self, drain: Option<Rc<dyn Drain<Tb::Output>>>) -> Result<Option<NextFount>> {
        let attached = drain.is_some();
        let result = begin_flowing_to(self.as_fount(), &self.downstream, drain)?;
        if attached {
            let waiting = self.state.borrow_mut().pause_because_no_drain.take();
            if let Some(pause) = waiting {
                pause.unpause();
            }
        }
        self.unbuffer();
        Ok(result)
    }

    fn pause_flow(&self) -> Result<Pause> {
        let first = self.state.borrow_mut().flow.request_pause();
        if first {
            if let Err(err) = self.actually_pause() {
                let mut state = self.state.borrow_mut();
                state.flow.release();
                state.pending.resume();
                return Err(err);
            }
        }
        let me = self.me.clone();
        Ok(Pause::new(move || {
            if let Some(siphon) = me.upgrade() {
                siphon.release_pause();
            }
        }))
    }

    fn stop_flow(&self) {
        let upstream = {
            let mut state = self.state.borrow_mut();
            state.can_still_process_input = false;
            state.can_still_produce_output = false;
            state.pending.clear();
            upstream_of(&self.upstream)
        };
        debug!("{} asked to stop", self.name);
        if let Some(fount) = upstream {
            fount.stop_flow();
        }
    }
}

impl<Tb: Tube> fmt::Debug for Siphon<Tb> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Siphon")
            .field("tube", &self.name)
            .field("flow", &self.state.borrow().flow)
            .finish()
    }
}
