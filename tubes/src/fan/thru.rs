use super::{In, Out};
use crate::error::{Result, StopReason};
use crate::flow::{Drain, Fount, NextFount};
use std::cell::RefCell;
use std::rc::Rc;

/// Scatter/gather: runs every item through several sub-pipelines at once.
///
/// Each item received is broadcast to every drain given to [`Thru::new`]; the
/// fount each of those drains leads to is merged back into a single output.
/// A `Thru` is itself a drain, and attaching an upstream to it returns the
/// merged fount, so it chains like a [`Siphon`](crate::Siphon):
///
/// ```text
///                  +-> drains[0] ... -+
///   upstream ─> Out+-> drains[1] ... -+In ─> downstream
///                  +-> drains[2] ... -+
/// ```
pub struct Thru<T: Clone + 'static, V: 'static> {
    out: Out<T>,
    fan_in: In<V>,
    drains: Vec<Rc<dyn Drain<T>>>,
    founts: RefCell<Vec<Option<Rc<dyn Fount<V>>>>>,
    out_founts: Vec<Rc<dyn Fount<T>>>,
    in_drains: Vec<Rc<dyn Drain<V>>>,
}

impl<T: Clone + 'static, V: 'static> Thru<T, V> {
    /// Builds a scatter/gather stage around `drains`.
    ///
    /// Attaching a fount to a drain in `drains` must yield a fount of `V`,
    /// otherwise attaching an upstream to the `Thru` fails with
    /// [`Error::UnexpectedFount`](crate::Error::UnexpectedFount).
    pub fn new(drains: impl IntoIterator<Item = Rc<dyn Drain<T>>>) -> Rc<Self> {
        let out = Out::new();
        let fan_in = In::new();
        let drains: Vec<_> = drains.into_iter().collect();
        let out_founts = drains.iter().map(|_| out.new_fount()).collect();
        let in_drains = drains.iter().map(|_| fan_in.new_drain()).collect();
        Rc::new(Self {
            founts: RefCell::new(vec![None; drains.len()]),
            out,
            fan_in,
            drains,
            out_founts,
            in_drains,
        })
    }

    /// The merged fount.
    pub fn fount(&self) -> Rc<dyn Fount<V>> {
        self.fan_in.fount()
    }
}

impl<T: Clone + 'static, V: 'static> Drain<T> for Thru<T, V> {
    fn input_type(&self) -> Option<&'static str> {
        self.out.drain().input_type()
    }

    fn fount(&self) -> Option<Rc<dyn Fount<T>>> {
        self.out.drain().fount()
    }

    fn flowing_from(&self, fount: Option<Rc<dyn Fount<T>>>) -> Result<Option<NextFount>> {
        self.out.drain().flowing_from(fount)?;
        for (index, (app_drain, (out_fount, in_drain))) in self
            .drains
            .iter()
            .zip(self.out_founts.iter().zip(&self.in_drains))
            .enumerate()
        {
            let attached = out_fount.flow_to(Some(Rc::clone(app_drain)))?;
            let app_fount = match attached {
                Some(next) => {
                    let next = next.downcast::<V>()?;
                    self.founts.borrow_mut()[index] = Some(Rc::clone(&next));
                    Some(next)
                }
                None => self.founts.borrow()[index].clone(),
            };
            if let Some(app_fount) = app_fount {
                app_fount.flow_to(Some(Rc::clone(in_drain)))?;
            }
        }

        let next_fount = self.fan_in.fount();
        match next_fount.drain() {
            None => Ok(Some(NextFount::new(next_fount))),
            Some(next_drain) => next_fount.flow_to(Some(next_drain)),
        }
    }

    fn receive(&self, item: T) {
        self.out.drain().receive(item);
    }

    fn flow_stopped(&self, reason: StopReason) {
        self.out.drain().flow_stopped(reason);
    }
}
