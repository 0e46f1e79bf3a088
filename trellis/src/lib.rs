//! A synchronous reactive computation engine: typed cells over a
//! thread-local STM substrate, plus a small attribute-binding layer for
//! wiring cells onto plain Rust objects.
//!
//! ```
//! use trellis::{modifier, Cell};
//!
//! let fahrenheit = Cell::new_value(32.0_f64);
//! let celsius = {
//!     let fahrenheit = fahrenheit.clone();
//!     Cell::new_computed(0.0, move || (fahrenheit.read() - 32.0) * 5.0 / 9.0)
//! };
//! assert_eq!(celsius.read(), 0.0);
//! modifier(|| fahrenheit.write(212.0).unwrap()).unwrap();
//! assert_eq!(celsius.read(), 100.0);
//! ```

pub mod attr;
pub mod cell;
pub mod error;
pub mod hooks;

pub use cell::{Cell, CellKind};
pub use error::{ConflictError, InvalidOperation, ReadOnlyError, TrellisError, UserError};
pub use trellis_runtime::Symbol;

use std::rc::Rc;

/// Runs `f` as one atomic section: every cell write inside it takes effect
/// together, the whole dependency graph is driven back to quiescence before
/// this call returns, and any error aborts the section, rolling back every
/// write and running every registered undo action in reverse order.
///
/// Nesting calls to `modifier` joins the already-open outer section rather
/// than starting a new one.
pub fn modifier<T>(f: impl FnOnce() -> T) -> Result<T, TrellisError> {
    trellis_runtime::atomically(f)
}

/// Registers an action to run, most-recently-registered first, if the
/// current atomic section aborts. Only meaningful from within [`modifier`].
pub fn on_undo(f: impl FnOnce() + 'static) {
    trellis_runtime::on_undo(f)
}

/// Captures a position in the undo log that [`rollback_to`] can return to
/// without aborting the enclosing section.
pub fn savepoint() -> usize {
    trellis_runtime::savepoint()
}

/// Runs every undo action recorded since `sp`, most recent first.
pub fn rollback_to(sp: usize) {
    trellis_runtime::rollback_to(sp)
}

/// Registers a resource whose `enter`/`exit` hooks bracket the current
/// atomic section's lifetime.
pub fn manage(scope: Rc<dyn trellis_runtime::ScopeManager>) {
    trellis_runtime::manage(scope)
}

/// Requests that the currently executing rule run again next sweep even if
/// none of its subjects change. Only valid from within a rule.
pub fn repeat() {
    trellis_runtime::repeat()
}

/// Registers the currently executing rule as a poller, so it re-runs after
/// every external write regardless of whether its own subjects changed.
/// Only valid from within a rule.
pub fn poll() {
    trellis_runtime::poll()
}

/// Forces the currently executing rule's output to be treated as changed
/// this run. Only valid from within a rule.
pub fn mark_dirty() {
    trellis_runtime::mark_dirty()
}

/// Whether a rule is currently executing on this thread.
pub fn in_rule() -> bool {
    trellis_runtime::in_rule()
}

/// Sets the cycle convergence iteration budget (default 100): the number of
/// times a single cell may be recomputed within one sweep before a stuck
/// cycle is reported as a [`ConflictError::Diverged`].
pub fn set_convergence_budget(budget: u32) {
    trellis_runtime::set_convergence_budget(budget)
}
