//! Pause tokens and the pause state machine shared by every fount.

use log::trace;
use std::fmt;

/// A one-shot capability to resume a suspended flow.
///
/// [`Fount::pause_flow`](crate::Fount::pause_flow) hands out a `Pause`; the
/// flow stays suspended until [`unpause`](Pause::unpause) is called on it.
/// `unpause` consumes the token, so a pause can never be released twice.
/// Dropping a `Pause` without unpausing it leaves the flow suspended.
#[must_use = "dropping a Pause leaves the flow paused forever"]
pub struct Pause {
    kind: PauseKind,
}

enum PauseKind {
    Placeholder,
    Resume(Box<dyn FnOnce()>),
    Aggregate(Vec<Pause>),
}

impl Pause {
    /// Creates a pause that runs `resume` when released.
    pub fn new(resume: impl FnOnce() + 'static) -> Self {
        Self {
            kind: PauseKind::Resume(Box::new(resume)),
        }
    }

    /// A pause that does nothing when released, for flows with nothing
    /// upstream to suspend.
    pub fn placeholder() -> Self {
        Self {
            kind: PauseKind::Placeholder,
        }
    }

    /// Bundles several pauses so that one `unpause` releases all of them,
    /// in the order given.
    pub fn aggregate(pauses: impl IntoIterator<Item = Pause>) -> Self {
        Self {
            kind: PauseKind::Aggregate(pauses.into_iter().collect()),
        }
    }

    /// Resumes the flow this token suspended.
    pub fn unpause(self) {
        match self.kind {
            PauseKind::Placeholder => {}
            PauseKind::Resume(resume) => resume(),
            PauseKind::Aggregate(pauses) => {
                for pause in pauses {
                    pause.unpause();
                }
            }
        }
    }
}

impl fmt::Debug for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PauseKind::Placeholder => write!(f, "Pause::Placeholder"),
            PauseKind::Resume(_) => write!(f, "Pause::Resume"),
            PauseKind::Aggregate(pauses) => f.debug_tuple("Pause::Aggregate").field(pauses).finish(),
        }
    }
}

/// Pause bookkeeping for one fount.
///
/// Any number of callers may hold a pause at once; only the first request
/// actually suspends the flow and only the last release resumes it. Once
/// stopped, requests and releases no longer change anything.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Nobody holds a pause.
    #[default]
    Unpaused,
    /// This many pauses are outstanding (never zero).
    Paused(usize),
    /// The flow has ended for good.
    Stopped,
}

impl FlowState {
    /// Records a new pause; returns `true` when the flow must actually be
    /// suspended now (the first outstanding pause).
    pub fn request_pause(&mut self) -> bool {
        match *self {
            FlowState::Unpaused => {
                trace!("flow paused");
                *self = FlowState::Paused(1);
                true
            }
            FlowState::Paused(depth) => {
                *self = FlowState::Paused(depth + 1);
                false
            }
            FlowState::Stopped => false,
        }
    }

    /// Records a released pause; returns `true` when the flow must actually
    /// be resumed now (the last outstanding pause went away).
    pub fn release(&mut self) -> bool {
        match *self {
            FlowState::Paused(1) => {
                trace!("flow resumed");
                *self = FlowState::Unpaused;
                true
            }
            FlowState::Paused(depth) => {
                *self = FlowState::Paused(depth - 1);
                false
            }
            FlowState::Unpaused | FlowState::Stopped => false,
        }
    }

    /// Ends the flow; outstanding pauses become inert.
    pub fn stop(&mut self) {
        *self = FlowState::Stopped;
    }

    /// Whether at least one pause is outstanding.
    pub fn is_paused(&self) -> bool {
        matches!(self, FlowState::Paused(_))
    }

    /// Whether [`stop`](FlowState::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        matches!(self, FlowState::Stopped)
    }

    /// Number of outstanding pauses.
    pub fn depth(&self) -> usize {
        match self {
            FlowState::Paused(depth) => *depth,
            FlowState::Unpaused | FlowState::Stopped => 0,
        }
    }
}
