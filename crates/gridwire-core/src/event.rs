//! Events delivered to tiles.

use crate::Tick;
use crate::property::SignalKind;

/// Gameplay notification routed to a tile's components.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Delivered once after a puzzle is built or loaded.
    Start,
    /// Delivered to tick subscribers once per tick.
    Tick(Tick),
    /// A wire feeding the named power input changed state.
    PowerChanged { input: &'static str, enabled: bool },
    /// A wire feeding the named number input changed value.
    ValueChanged {
        input: &'static str,
        value: i32,
        transient: bool,
    },
    /// One-shot signal arriving at the named input.
    Signal {
        input: &'static str,
        kind: SignalKind,
    },
    Interact,
    Enter,
    Leave,
}

/// Event envelope carrying the `handled` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub handled: bool,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            handled: false,
        }
    }
}

/// Delivery policy for events sent to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Every occupied layer receives the event.
    All,
    /// Occupied layers top-down until one handles it.
    FirstHandled,
    /// Only the topmost occupied layer.
    FirstVisible,
}
