#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tubes::{
    Drain, DrainSlot, Fount, FountSlot, NextFount, Pause, Result, StopReason, begin_flowing_from,
    begin_flowing_to,
};

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fount driven by the test, counting every control call it receives.
pub struct FakeFount<T: 'static> {
    me: Weak<FakeFount<T>>,
    downstream: DrainSlot<T>,
    outstanding: Rc<Cell<usize>>,
    pause_calls: Cell<usize>,
    stop_calls: Cell<usize>,
    events: RefCell<Option<(&'static str, Events)>>,
}

pub type Events = Rc<RefCell<Vec<String>>>;

impl<T: 'static> FakeFount<T> {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| FakeFount {
            me: me.clone(),
            downstream: RefCell::new(None),
            outstanding: Rc::new(Cell::new(0)),
            pause_calls: Cell::new(0),
            stop_calls: Cell::new(0),
            events: RefCell::new(None),
        })
    }

    /// Logs "pause <name>" and "resume <name>" into `events`.
    pub fn record_into(&self, name: &'static str, events: &Events) {
        *self.events.borrow_mut() = Some((name, Rc::clone(events)));
    }

    pub fn deliver(&self, item: T) {
        if let Some(drain) = self.drain() {
            drain.receive(item);
        }
    }

    pub fn finish(&self, reason: StopReason) {
        if let Some(drain) = self.drain() {
            drain.flow_stopped(reason);
        }
    }

    /// Pauses handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    pub fn is_paused(&self) -> bool {
        self.outstanding.get() > 0
    }

    pub fn pause_calls(&self) -> usize {
        self.pause_calls.get()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.get()
    }
}

impl<T: 'static> Fount<T> for FakeFount<T> {
    fn drain(&self) -> Option<Rc<dyn Drain<T>>> {
        self.downstream.borrow().clone()
    }

    fn flow_to(&self, drain: Option<Rc<dyn Drain<T>>>) -> Result<Option<NextFount>> {
        let this: Rc<dyn Fount<T>> = self.me.upgrade().expect("fake fount alive");
        begin_flowing_to(this, &self.downstream, drain)
    }

    fn pause_flow(&self) -> Result<Pause> {
        self.pause_calls.set(self.pause_calls.get() + 1);
        self.outstanding.set(self.outstanding.get() + 1);
        let outstanding = Rc::clone(&self.outstanding);
        let events = self.events.borrow().clone();
        if let Some((name, events)) = &events {
            events.borrow_mut().push(format!("pause {name}"));
        }
        Ok(Pause::new(move || {
            outstanding.set(outstanding.get() - 1);
            if let Some((name, events)) = events {
                events.borrow_mut().push(format!("resume {name}"));
            }
        }))
    }

    fn stop_flow(&self) {
        self.stop_calls.set(self.stop_calls.get() + 1);
    }
}

type Hook<T> = Box<dyn FnMut(&T)>;

/// A drain recording everything delivered to it.
pub struct FakeDrain<T: 'static> {
    upstream: FountSlot<T>,
    pub received: RefCell<Vec<T>>,
    pub stopped: RefCell<Vec<StopReason>>,
    on_receive: RefCell<Option<Hook<T>>>,
}

impl<T: 'static> FakeDrain<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(FakeDrain {
            upstream: RefCell::new(None),
            received: RefCell::new(vec![]),
            stopped: RefCell::new(vec![]),
            on_receive: RefCell::new(None),
        })
    }

    /// Runs `hook` on each item just before it is recorded.
    pub fn on_receive(&self, hook: impl FnMut(&T) + 'static) {
        *self.on_receive.borrow_mut() = Some(Box::new(hook));
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.borrow().len()
    }
}

impl<T: Clone + 'static> FakeDrain<T> {
    pub fn items(&self) -> Vec<T> {
        self.received.borrow().clone()
    }
}

impl<T: 'static> Drain<T> for FakeDrain<T> {
    fn fount(&self) -> Option<Rc<dyn Fount<T>>> {
        self.upstream.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>> {
        begin_flowing_from(self, &self.upstream, fount.as_ref())?;
        Ok(None)
    }

    fn receive(&self, item: T) {
        let hook = self.on_receive.borrow_mut().take();
        match hook {
            Some(mut hook) => {
                hook(&item);
                self.received.borrow_mut().push(item);
                let mut slot = self.on_receive.borrow_mut();
                if slot.is_none() {
                    *slot = Some(hook);
                }
            }
            None => self.received.borrow_mut().push(item),
        }
    }

    fn flow_stopped(&self, reason: StopReason) {
        self.stopped.borrow_mut().push(reason);
    }
}

/// Attaches `fount` to `drain` and returns the next fount along the chain.
pub fn attach<T: 'static, U: 'static, F: Fount<T> + ?Sized>(
    fount: &F,
    drain: Rc<dyn Drain<T>>,
) -> Rc<dyn Fount<U>> {
    fount
        .flow_to(Some(drain))
        .expect("attach")
        .expect("next fount")
        .downcast::<U>()
        .expect("fount type")
}
