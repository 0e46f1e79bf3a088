//! Traits an embedder implements to wire the engine to the outside world.
//!
//! Nothing in this crate implements these — they're the seam a host
//! application (an event loop, a test harness, a hardware driver) fills in.

use std::time::Duration;

use crate::{Cell, TrellisError};

/// A source of wall-clock scheduling, so a host can run sweeps on a timer or
/// in response to its own event loop instead of the engine polling in a
/// busy loop.
pub trait Clock {
    /// Schedules `fire` to run once, after `delay`.
    fn schedule_once(&self, delay: Duration, fire: Box<dyn FnOnce()>);
}

/// Drives idle-time work between externally-triggered atomic sections, most
/// importantly giving registered pollers (cells that called [`crate::poll`])
/// a chance to re-run.
pub trait IdleLoop {
    /// Runs once per idle tick. A typical implementation wraps a no-op
    /// [`crate::modifier`] call, relying on the scheduler to re-run any
    /// poller whose subjects haven't otherwise changed.
    fn tick(&self) -> Result<(), TrellisError>;
}

/// Bridges one [`Cell`] to an external data source or sink — a socket, a
/// GUI widget, a hardware driver — without the cell itself depending on the
/// transport.
///
/// A [`crate::CellKind::Sensor`] built with [`Cell::new_sensor`] pulls its
/// value through its own `read` closure instead, so this trait is for the
/// plain writable cells and [`Cell::new_connected_effector`] sinks a
/// connector feeds directly.
pub trait Connector<T: Clone + PartialEq + std::fmt::Debug + 'static> {
    /// The cell this connector feeds.
    fn cell(&self) -> &Cell<T>;

    /// Delivers an externally observed value into the cell, inside a fresh
    /// atomic section (or the one already open, if called from within one).
    fn deliver(&self, value: T) -> Result<(), TrellisError> {
        crate::modifier(|| self.cell().write(value)).and_then(|r| r)
    }
}
