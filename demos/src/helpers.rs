//! Sources, sinks and logging set-up shared by the examples.

use log::{debug, info};
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::io::Write;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use tubes::{
    Drain, DrainSlot, FlowState, Fount, FountSlot, NextFount, Pause, Result, StopReason,
    begin_flowing_from, begin_flowing_to,
};

/// Installs env_logger with a timestamped format when `debug` is set.
pub fn init_logger(debug: bool, log_level: &str) -> anyhow::Result<()> {
    let log_level = log::LevelFilter::from_str(log_level)?;
    if debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }
    Ok(())
}

/// A fount that emits the items of an iterator as fast as its drain allows,
/// then finishes the flow.
pub struct IterFount<T: 'static> {
    me: Weak<IterFount<T>>,
    items: RefCell<Box<dyn Iterator<Item = T>>>,
    state: Cell<FlowState>,
    downstream: DrainSlot<T>,
    pumping: Cell<bool>,
}

impl<T: 'static> IterFount<T> {
    pub fn new<I>(items: I) -> Rc<Self>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Rc::new_cyclic(|me| IterFount {
            me: me.clone(),
            items: RefCell::new(Box::new(items.into_iter())),
            state: Cell::new(FlowState::Unpaused),
            downstream: RefCell::new(None),
            pumping: Cell::new(false),
        })
    }

    /// Delivers items until the flow is paused, stopped or exhausted.
    pub fn pump(&self) {
        if self.pumping.replace(true) {
            return;
        }
        while self.state.get() == FlowState::Unpaused {
            let Some(drain) = self.drain() else {
                break;
            };
            let next = self.items.borrow_mut().next();
            match next {
                Some(item) => drain.receive(item),
                None => {
                    self.state.set(FlowState::Stopped);
                    debug!("source exhausted");
                    drain.flow_stopped(StopReason::Finished);
                }
            }
        }
        self.pumping.set(false);
    }

    fn resume(&self) {
        let mut state = self.state.get();
        let resumed = state.release();
        self.state.set(state);
        if resumed {
            self.pump();
        }
    }
}

impl<T: 'static> Fount<T> for IterFount<T> {
    fn drain(&self) -> Option<Rc<dyn Drain<T>>> {
        self.downstream.borrow().clone()
    }

    fn flow_to(&self, drain: Option<Rc<dyn Drain<T>>>) -> Result<Option<NextFount>> {
        let this: Rc<dyn Fount<T>> = match self.me.upgrade() {
            Some(this) => this,
            None => panic!("source used while being dropped"),
        };
        begin_flowing_to(this, &self.downstream, drain)
    }

    fn pause_flow(&self) -> Result<Pause> {
        let mut state = self.state.get();
        state.request_pause();
        self.state.set(state);
        let me = self.me.clone();
        Ok(Pause::new(move || {
            if let Some(source) = me.upgrade() {
                source.resume();
            }
        }))
    }

    fn stop_flow(&self) {
        self.state.set(FlowState::Stopped);
    }
}

/// A drain that prints what it receives.
pub struct Printer<T: 'static> {
    label: String,
    upstream: FountSlot<T>,
    received: Cell<usize>,
    stops: Cell<usize>,
}

impl<T: Display + 'static> Printer<T> {
    pub fn new(label: &str) -> Rc<Self> {
        Rc::new(Printer {
            label: label.to_owned(),
            upstream: RefCell::new(None),
            received: Cell::new(0),
            stops: Cell::new(0),
        })
    }

    pub fn received(&self) -> usize {
        self.received.get()
    }

    pub fn stops(&self) -> usize {
        self.stops.get()
    }
}

impl<T: Display + 'static> Drain<T> for Printer<T> {
    fn fount(&self) -> Option<Rc<dyn Fount<T>>> {
        self.upstream.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>> {
        begin_flowing_from(self, &self.upstream, fount.as_ref())?;
        Ok(None)
    }

    fn receive(&self, item: T) {
        self.received.set(self.received.get() + 1);
        println!("{}: {}", self.label, item);
    }

    fn flow_stopped(&self, reason: StopReason) {
        self.stops.set(self.stops.get() + 1);
        info!("{} saw the end of the flow: {}", self.label, reason);
    }
}
