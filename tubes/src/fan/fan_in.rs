use super::branches::Branches;
use crate::error::{Result, StopReason};
use crate::flow::{
    Drain, DrainSlot, Fount, FountSlot, NextFount, begin_flowing_from, begin_flowing_to,
    downstream_of, upstream_of,
};
use crate::pause::Pause;
use log::{trace, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Merges many upstream flows into one.
///
/// Every drain handed out by [`In::new_drain`] relays what it receives to
/// whatever drain is attached to the shared [`fount`](In::fount). Until that
/// shared fount has a drain, every branch keeps its own upstream paused.
///
/// ```rust
/// # use tubes::{Fount, In};
/// let fan_in = In::<u32>::new();
/// let left = fan_in.new_drain();
/// let right = fan_in.new_drain();
/// # let _ = (left, right);
/// assert!(fan_in.fount().drain().is_none());
/// ```
pub struct In<T: 'static> {
    fount: Rc<InFount<T>>,
}

impl<T: 'static> In<T> {
    /// Creates a fan-in with no branches.
    pub fn new() -> Self {
        Self {
            fount: Rc::new_cyclic(|me| InFount {
                me: me.clone(),
                downstream: RefCell::new(None),
                branches: RefCell::new(Branches::new()),
            }),
        }
    }

    /// The shared fount all branches deliver through.
    pub fn fount(&self) -> Rc<dyn Fount<T>> {
        self.fount.clone()
    }

    /// Adds a branch and returns the drain to attach its upstream to.
    pub fn new_drain(&self) -> Rc<dyn Drain<T>> {
        let drain = Rc::new(InDrain {
            fan: Rc::clone(&self.fount),
            upstream: RefCell::new(None),
            pause_because_no_drain: RefCell::new(None),
        });
        let mut branches = self.fount.branches.borrow_mut();
        branches.prune();
        let id = branches.next_id();
        branches.insert(id, Rc::downgrade(&drain));
        drain
    }

    /// Number of live branches.
    pub fn branch_count(&self) -> usize {
        let mut branches = self.fount.branches.borrow_mut();
        branches.prune();
        branches.len()
    }
}

impl<T: 'static> Default for In<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct InFount<T: 'static> {
    me: Weak<InFount<T>>,
    downstream: DrainSlot<T>,
    branches: RefCell<Branches<Weak<InDrain<T>>>>,
}

impl<T: 'static> InFount<T> {
    fn this(&self) -> Rc<dyn Fount<T>> {
        match self.me.upgrade() {
            Some(this) => this,
            None => panic!("fan-in fount used while being dropped"),
        }
    }

    fn live_branches(&self) -> Vec<Rc<InDrain<T>>> {
        let snapshot = self.branches.borrow().snapshot();
        snapshot.iter().filter_map(Weak::upgrade).collect()
    }

    /// Upstream founts of every attached branch.
    fn branch_founts(&self) -> Vec<Rc<dyn Fount<T>>> {
        self.live_branches()
            .iter()
            .filter_map(|branch| upstream_of(&branch.upstream))
            .collect()
    }
}

impl<T: 'static> Fount<T> for InFount<T> {
    fn drain(&self) -> Option<Rc<dyn Drain<T>>> {
        downstream_of(&self.downstream)
    }

    fn flow_to(&self, drain: Option<Rc<dyn Drain<T>>>) -> Result<Option<NextFount>> {
        let result = begin_flowing_to(self.this(), &self.downstream, drain)?;
        for branch in self.live_branches() {
            branch.check_no_drain_pause()?;
        }
        Ok(result)
    }

    fn pause_flow(&self) -> Result<Pause> {
        let mut pauses = Vec::new();
        for fount in self.branch_founts() {
            match fount.pause_flow() {
                Ok(pause) => pauses.push(pause),
                Err(err) => {
                    for pause in pauses {
                        pause.unpause();
                    }
                    return Err(err);
                }
            }
        }
        trace!("fan-in paused {} branches", pauses.len());
        Ok(Pause::aggregate(pauses))
    }

    fn stop_flow(&self) {
        for fount in self.branch_founts() {
            fount.stop_flow();
        }
    }
}

struct InDrain<T: 'static> {
    fan: Rc<InFount<T>>,
    upstream: FountSlot<T>,
    pause_because_no_drain: RefCell<Option<Pause>>,
}

impl<T: 'static> InDrain<T> {
    /// Holds the upstream paused while the fan-in has nowhere to deliver.
    ///
    /// The new pause is taken before the old one is released, so re-checking
    /// against the same upstream never lets it run in between.
    fn check_no_drain_pause(&self) -> Result<()> {
        let previous = self.pause_because_no_drain.borrow_mut().take();
        let fount = upstream_of(&self.upstream);
        if let Some(fount) = fount {
            if self.fan.drain().is_none() {
                match fount.pause_flow() {
                    Ok(pause) => *self.pause_because_no_drain.borrow_mut() = Some(pause),
                    Err(err) => {
                        *self.pause_because_no_drain.borrow_mut() = previous;
                        return Err(err);
                    }
                }
            }
        }
        if let Some(pause) = previous {
            pause.unpause();
        }
        Ok(())
    }
}

impl<T: 'static> Drain<T> for InDrain<T> {
    fn fount(&self) -> Option<Rc<dyn Fount<T>>> {
        upstream_of(&self.upstream)
    }

    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>> {
        begin_flowing_from(self, &self.upstream, fount.as_ref())?;
        self.check_no_drain_pause()?;
        Ok(None)
    }

    fn receive(&self, item: T) {
        match self.fan.drain() {
            Some(drain) => drain.receive(item),
            None => warn!("fan-in dropping an item with no drain attached"),
        }
    }

    fn flow_stopped(&self, reason: StopReason) {
        match self.fan.drain() {
            Some(drain) => drain.flow_stopped(reason),
            None => warn!("fan-in dropping flow_stopped with no drain attached: {}", reason),
        }
    }
}
