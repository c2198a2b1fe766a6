use super::branches::{BranchId, Branches};
use crate::error::{Error, Result, StopReason};
use crate::flow::{
    Drain, DrainSlot, Fount, FountSlot, NextFount, begin_flowing_from, begin_flowing_to,
    downstream_of, same, upstream_of,
};
use crate::pause::{FlowState, Pause};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Broadcasts one upstream flow to many downstream branches.
///
/// Items and the stop notification received by the shared [`drain`](Out::drain)
/// are delivered to every fount handed out by [`Out::new_fount`] that has a
/// drain attached, in the order the founts were created.
///
/// Pausing any branch pauses the single upstream. Pauses from different
/// branches are shared: the upstream resumes only when every branch has
/// released its pause. A branch may hold only one pause at a time; asking a
/// branch that is already paused to pause again is an
/// [`Error::AlreadyPaused`].
pub struct Out<T: Clone + 'static> {
    drain: Rc<OutDrain<T>>,
}

impl<T: Clone + 'static> Out<T> {
    /// Creates a fan-out with no branches.
    pub fn new() -> Self {
        Self {
            drain: Rc::new_cyclic(|me| OutDrain {
                me: me.clone(),
                upstream: RefCell::new(None),
                founts: RefCell::new(Branches::new()),
                pause: RefCell::new(SharedPause {
                    flow: FlowState::Unpaused,
                    upstream_pause: None,
                    paused: false,
                }),
            }),
        }
    }

    /// The shared drain to attach the upstream to.
    pub fn drain(&self) -> Rc<dyn Drain<T>> {
        self.drain.clone()
    }

    /// Adds a branch and returns its fount.
    pub fn new_fount(&self) -> Rc<dyn Fount<T>> {
        let mut founts = self.drain.founts.borrow_mut();
        let id = founts.next_id();
        let fount = Rc::new_cyclic(|me| OutFount {
            me: me.clone(),
            out: self.drain.me.clone(),
            id,
            downstream: RefCell::new(None),
            outstanding: Cell::new(false),
        });
        founts.insert(id, Rc::clone(&fount));
        fount
    }

    /// Number of branches that have not stopped.
    pub fn branch_count(&self) -> usize {
        self.drain.founts.borrow().len()
    }
}

impl<T: Clone + 'static> Default for Out<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct SharedPause {
    flow: FlowState,
    upstream_pause: Option<Pause>,
    paused: bool,
}

struct OutDrain<T: Clone + 'static> {
    me: Weak<OutDrain<T>>,
    upstream: FountSlot<T>,
    founts: RefCell<Branches<Rc<OutFount<T>>>>,
    pause: RefCell<SharedPause>,
}

impl<T: Clone + 'static> OutDrain<T> {
    fn pause(&self) -> Result<()> {
        let first = self.pause.borrow_mut().flow.request_pause();
        if first {
            if let Err(err) = self.actually_pause() {
                self.pause.borrow_mut().flow.release();
                return Err(err);
            }
        }
        Ok(())
    }

    fn actually_pause(&self) -> Result<()> {
        {
            let mut shared = self.pause.borrow_mut();
            if shared.paused {
                return Err(Error::AlreadyPaused);
            }
            shared.paused = true;
        }
        let upstream = upstream_of(&self.upstream);
        if let Some(fount) = upstream {
            match fount.pause_flow() {
                Ok(pause) => self.pause.borrow_mut().upstream_pause = Some(pause),
                Err(err) => {
                    self.pause.borrow_mut().paused = false;
                    return Err(err);
                }
            }
        }
        trace!("fan-out paused upstream");
        Ok(())
    }

    fn release(&self) {
        let held = {
            let mut shared = self.pause.borrow_mut();
            if !shared.flow.release() {
                return;
            }
            shared.paused = false;
            shared.upstream_pause.take()
        };
        trace!("fan-out resumed upstream");
        if let Some(pause) = held {
            pause.unpause();
        }
    }

    /// Delivers to every branch that is still present when its turn comes.
    fn broadcast(&self, mut deliver: impl FnMut(Rc<dyn Drain<T>>)) {
        let ids = self.founts.borrow().ids();
        for id in ids {
            let fount = self.founts.borrow().get(id).cloned();
            if let Some(drain) = fount.and_then(|fount| fount.drain()) {
                deliver(drain);
            }
        }
    }
}

impl<T: Clone + 'static> Drain<T> for OutDrain<T> {
    fn fount(&self) -> Option<Rc<dyn Fount<T>>> {
        upstream_of(&self.upstream)
    }

    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>> {
        let previous = upstream_of(&self.upstream);
        begin_flowing_from(self, &self.upstream, fount.as_ref())?;

        let unchanged = match (&previous, &fount) {
            (Some(previous), Some(fount)) => same(previous, fount),
            _ => false,
        };
        let paused = self.pause.borrow().paused;
        if paused && !unchanged {
            // Move the held pause over to the new upstream.
            let replacement = match &fount {
                Some(fount) => Some(fount.pause_flow()?),
                None => None,
            };
            let stale = std::mem::replace(&mut self.pause.borrow_mut().upstream_pause, replacement);
            if let Some(stale) = stale {
                stale.unpause();
            }
        }
        Ok(None)
    }

    fn receive(&self, item: T) {
        self.broadcast(|drain| drain.receive(item.clone()));
    }

    fn flow_stopped(&self, reason: StopReason) {
        debug!("fan-out broadcasting stop: {}", reason);
        self.broadcast(|drain| drain.flow_stopped(reason.clone()));
    }
}

struct OutFount<T: Clone + 'static> {
    me: Weak<OutFount<T>>,
    out: Weak<OutDrain<T>>,
    id: BranchId,
    downstream: DrainSlot<T>,
    outstanding: Cell<bool>,
}

impl<T: Clone + 'static> Fount<T> for OutFount<T> {
    fn drain(&self) -> Option<Rc<dyn Drain<T>>> {
        downstream_of(&self.downstream)
    }

    fn flow_to(&self, drain: Option<Rc<dyn Drain<T>>>) -> Result<Option<NextFount>> {
        let this: Rc<dyn Fount<T>> = match self.me.upgrade() {
            Some(this) => this,
            None => panic!("fan-out fount used while being dropped"),
        };
        begin_flowing_to(this, &self.downstream, drain)
    }

    fn pause_flow(&self) -> Result<Pause> {
        if self.outstanding.get() {
            return Err(Error::AlreadyPaused);
        }
        let Some(out) = self.out.upgrade() else {
            return Ok(Pause::placeholder());
        };
        out.pause()?;
        self.outstanding.set(true);
        let me = self.me.clone();
        let out = self.out.clone();
        Ok(Pause::new(move || {
            if let Some(fount) = me.upgrade() {
                fount.outstanding.set(false);
            }
            if let Some(out) = out.upgrade() {
                out.release();
            }
        }))
    }

    fn stop_flow(&self) {
        let Some(out) = self.out.upgrade() else {
            return;
        };
        let removed = out.founts.borrow_mut().remove(self.id);
        if removed.is_some() {
            debug!("fan-out branch stopped");
        }
    }
}
