//! # Founts and Drains
//!
//! A [`Fount`] produces items, a [`Drain`] consumes them. Connecting the two is
//! always initiated from the fount side with [`Fount::flow_to`], which in turn
//! calls [`Drain::flowing_from`] so both ends agree on who is attached to whom.
//!
//! ```text
//!   items, flow_stopped          items, flow_stopped
//!   ------------------->  +--------+  ------------------->
//!   Fount            Drain| Siphon |Fount             Drain
//!   <-------------------  +--------+  <-------------------
//!   pause_flow, stop_flow          pause_flow, stop_flow
//! ```
//!
//! Everything here is single-threaded and cooperative: every call runs to
//! completion before the next begins, and the only way to suspend a flow is
//! to hold the [`Pause`] returned by [`Fount::pause_flow`].
//!
//! Founts keep their downstream drain alive; drains only hold a weak handle
//! to their upstream fount. A pipeline therefore lives as long as its source.

use crate::error::{Error, Result, StopReason};
use crate::pause::Pause;
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A producer of items that honours pause and stop requests.
pub trait Fount<T: 'static> {
    /// Type tag of the items this fount emits, checked on attachment.
    /// `None` means untyped.
    fn output_type(&self) -> Option<&'static str> {
        None
    }

    /// The drain this fount is currently delivering to.
    fn drain(&self) -> Option<Rc<dyn Drain<T>>>;

    /// Starts delivering to `drain`, or detaches when `drain` is `None`.
    ///
    /// Returns whatever the drain's [`Drain::flowing_from`] returns, which is
    /// typically the next fount in the chain.
    fn flow_to(&self, drain: Option<Rc<dyn Drain<T>>>) -> Result<Option<NextFount>>;

    /// Suspends delivery until the returned pause is released.
    fn pause_flow(&self) -> Result<Pause>;

    /// Ends the flow; the fount will deliver nothing more.
    fn stop_flow(&self);
}

/// A consumer of items.
pub trait Drain<T: 'static> {
    /// Type tag of the items this drain accepts, checked on attachment.
    /// `None` accepts anything.
    fn input_type(&self) -> Option<&'static str> {
        None
    }

    /// The fount currently delivering to this drain.
    fn fount(&self) -> Option<Rc<dyn Fount<T>>>;

    /// Called by `fount` when it starts delivering here (or with `None` when
    /// it detaches). Returns the fount further down the chain, if any.
    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>>;

    /// Accepts one item.
    fn receive(&self, item: T);

    /// The upstream will deliver nothing more.
    fn flow_stopped(&self, reason: StopReason);
}

/// The fount returned by an attachment, with its item type erased.
///
/// Attaching a drain yields the next fount along the chain, whose item type
/// only the caller knows; recover it with [`NextFount::downcast`].
pub struct NextFount {
    fount: Box<dyn Any>,
    item_type: &'static str,
}

impl NextFount {
    /// Erases the item type of `fount`.
    pub fn new<T: 'static>(fount: Rc<dyn Fount<T>>) -> Self {
        Self {
            fount: Box::new(fount),
            item_type: type_name::<T>(),
        }
    }

    /// Name of the item type the fount produces.
    pub fn item_type(&self) -> &'static str {
        self.item_type
    }

    /// Recovers the fount as a producer of `T`.
    pub fn downcast<T: 'static>(self) -> Result<Rc<dyn Fount<T>>> {
        let actual = self.item_type;
        self.fount
            .downcast::<Rc<dyn Fount<T>>>()
            .map(|fount| *fount)
            .map_err(|_| Error::UnexpectedFount {
                expected: type_name::<T>(),
                actual,
            })
    }
}

impl fmt::Debug for NextFount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextFount")
            .field("item_type", &self.item_type)
            .finish()
    }
}

/// Where a drain remembers its upstream fount.
pub type FountSlot<T> = RefCell<Option<Weak<dyn Fount<T>>>>;

/// Where a fount remembers its downstream drain.
pub type DrainSlot<T> = RefCell<Option<Rc<dyn Drain<T>>>>;

pub(crate) fn upstream_of<T: 'static>(slot: &FountSlot<T>) -> Option<Rc<dyn Fount<T>>> {
    slot.borrow().as_ref().and_then(Weak::upgrade)
}

pub(crate) fn downstream_of<T: 'static>(slot: &DrainSlot<T>) -> Option<Rc<dyn Drain<T>>> {
    slot.borrow().clone()
}

/// Whether two handles point at the same object, whatever trait they are
/// viewed through.
pub fn same<A: ?Sized, B: ?Sized>(a: &Rc<A>, b: &Rc<B>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Records `drain` as the downstream of `fount` and tells `drain` about it.
///
/// A previously attached drain that still points back at `fount` is detached
/// first. If `drain` refuses the attachment, `fount` is left with no drain.
/// Fount implementations call this from [`Fount::flow_to`].
pub fn begin_flowing_to<T: 'static>(
    fount: Rc<dyn Fount<T>>,
    slot: &DrainSlot<T>,
    drain: Option<Rc<dyn Drain<T>>>,
) -> Result<Option<NextFount>> {
    let previous = slot.replace(drain.clone());
    if let Some(previous) = previous {
        let replaced = drain.as_ref().is_none_or(|drain| !same(drain, &previous));
        let points_back = previous
            .fount()
            .is_some_and(|upstream| same(&upstream, &fount));
        if replaced && points_back {
            previous.flowing_from(None)?;
        }
    }
    match drain {
        Some(drain) => {
            let result = drain.flowing_from(Some(fount));
            if result.is_err() {
                slot.replace(None);
            }
            result
        }
        None => Ok(None),
    }
}

/// Records `fount` as the upstream of `drain`.
///
/// Fails if the fount's output type tag and the drain's input type tag are
/// both present and differ. A previously attached fount that still delivers
/// to `drain` is detached. Drain implementations call this from
/// [`Drain::flowing_from`].
pub fn begin_flowing_from<T: 'static>(
    drain: &dyn Drain<T>,
    slot: &FountSlot<T>,
    fount: Option<&Rc<dyn Fount<T>>>,
) -> Result<()> {
    if let Some(fount) = fount {
        if let (Some(output), Some(input)) = (fount.output_type(), drain.input_type()) {
            if output != input {
                return Err(Error::TypeMismatch {
                    fount: output,
                    drain: input,
                });
            }
        }
    }
    let previous = slot
        .replace(fount.map(Rc::downgrade))
        .and_then(|previous| previous.upgrade());
    if let Some(previous) = previous {
        let replaced = fount.is_none_or(|fount| !same(fount, &previous));
        let points_here = previous
            .drain()
            .is_some_and(|downstream| std::ptr::addr_eq(Rc::as_ptr(&downstream), drain));
        if replaced && points_here {
            previous.flow_to(None)?;
        }
    }
    Ok(())
}
