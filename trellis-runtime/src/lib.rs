//! Low-level types implementing the reactive STM substrate and scheduler.
//!
//! This crate is a minimal symbol-indirected runtime: it is type-erased (it
//! never sees a cell's value type `T`), thread-local rather than global, and
//! `!Send + !Sync` by design, dispatching through plain `Rc<dyn ErasedCell>`
//! trait objects since sharing one engine across threads is out of scope
//! here.
//!
//! The `trellis` crate builds the typed `Cell<T>` API on top of this.

mod engine;
mod error;
mod graph;
mod symbol;

pub use engine::{
    abort_section, downcast_payload, CellKind, DeferredWrite, ErasedCell, RecomputeOutcome,
    RunFlags, ScopeManager, SensorHooks, OBSERVER_LAYER,
};
pub use error::{ConflictError, InvalidOperation, ReadOnlyError, TrellisError, UserError};
pub use graph::ListenerGraph;
pub use symbol::Symbol;

#[cfg(test)]
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use engine::Engine;

thread_local! {
    static ENGINE: Engine = Engine::new();
}

fn with<T>(f: impl FnOnce(&Engine) -> T) -> T {
    ENGINE.with(f)
}

/// Allocates a fresh, never-reused [`Symbol`] for this thread's engine.
pub fn next_id() -> Symbol {
    with(|e| e.next_id())
}

/// Registers a cell's scheduler-facing operations under `id`. The engine
/// holds only a weak reference; a cell is purged automatically once its last
/// strong reference (typically the typed `Cell<T>` handle and any rule
/// closures that captured a clone of it) is dropped.
pub fn register(id: Symbol, kind: CellKind, cell: Weak<dyn ErasedCell>) {
    with(|e| e.register(id, kind, cell))
}

/// Removes `id` and every link touching it from the graph.
pub fn purge(id: Symbol) {
    with(|e| e.purge(id))
}

/// Registers `id`'s connect/disconnect lifecycle, fired as its listener
/// count crosses 0/nonzero (a sensor acquiring or losing its last reader).
pub fn register_sensor_hooks(id: Symbol, hooks: Rc<dyn SensorHooks>) {
    with(|e| e.register_sensor_hooks(id, hooks))
}

/// The cell whose rule is currently executing on this thread, if any.
pub fn current_cell() -> Option<Symbol> {
    with(|e| e.current_cell())
}

/// Whether a rule is currently executing on this thread.
pub fn in_rule() -> bool {
    with(|e| e.in_rule())
}

/// Whether `id` is the cell whose rule is currently executing (the
/// condition under which a read sees the prior value instead of recursing).
pub fn is_current(id: Symbol) -> bool {
    with(|e| e.is_current(id))
}

/// True while a section's commit/abort hooks are running.
pub fn in_cleanup() -> bool {
    with(|e| e.in_cleanup())
}

/// Whether an atomic section is currently open, whether or not a rule is
/// presently executing inside it.
pub fn in_section() -> bool {
    with(|e| e.in_section())
}

/// Runs `f` with `sym` marked as the currently executing cell, returning its
/// result together with every distinct subject read via nested
/// [`record_dependency`] calls, and any `repeat`/`poll`/`mark_dirty` requests
/// `f` made about itself.
pub fn run_tracked<T>(sym: Symbol, f: impl FnOnce() -> T) -> (T, Vec<Symbol>, RunFlags) {
    with(|e| e.run_tracked(sym, f))
}

/// Records `subject` as read by the currently executing rule, if any.
pub fn record_dependency(subject: Symbol) {
    with(|e| e.record_dependency(subject))
}

pub fn iter_subjects_of(listener: Symbol) -> Vec<Symbol> {
    with(|e| e.iter_subjects_of(listener))
}

pub fn iter_listeners_of(subject: Symbol) -> Vec<Symbol> {
    with(|e| e.iter_listeners_of(subject))
}

/// Whether `id` has a pending recomputation (`needs > version`).
pub fn is_dirty(id: Symbol) -> bool {
    with(|e| e.is_dirty(id))
}

pub fn layer_of(id: Symbol) -> u32 {
    with(|e| e.layer_of(id))
}

/// `max(subjects' layers) + 1`, or `0` if `subjects` is empty.
pub fn layer_for_subjects(subjects: &[Symbol]) -> u32 {
    with(|e| e.layer_for_subjects(subjects))
}

/// Ensures `id` reflects its rule's output under the current values of its
/// subjects, recomputing it (and, recursively, any stale subjects) first if
/// necessary. This is what `Cell::read` calls before returning a value.
pub fn freshen(id: Symbol) {
    with(|e| e.freshen(id))
}

/// Forces `id` to be recomputed even though nothing it reads has changed.
pub fn ensure_recalc(id: Symbol) {
    with(|e| e.ensure_recalc(id))
}

/// The engine's sweep-count "as-of" version.
pub fn version() -> u64 {
    with(|e| e.version())
}

pub fn current_section_id() -> u64 {
    with(|e| e.current_section_id())
}

/// Bumps the version and schedules `id`'s dependents. Must run inside
/// [`atomically`]; used for writes that originate outside of a running rule.
pub fn propagate_external_write(id: Symbol) {
    with(|e| e.propagate_external_write(id))
}

/// Queues a write to be applied once the currently running rule returns.
pub fn defer_write(target: Symbol, apply: Box<dyn FnOnce()>) {
    with(|e| e.defer_write(target, apply))
}

pub fn unregister_poller(id: Symbol) {
    with(|e| e.unregister_poller(id))
}

/// Requests that the currently executing rule be re-run next sweep even if
/// none of its subjects change. Must be called from within a running rule.
pub fn repeat() {
    with(|e| e.request_repeat())
}

/// Registers the currently executing rule as a poller: it re-runs after
/// every external write even when its own subjects didn't change. Must be
/// called from within a running rule.
pub fn poll() {
    with(|e| e.request_poll())
}

/// Forces the currently executing rule's output to be treated as changed
/// this run. Must be called from within a running rule.
pub fn mark_dirty() {
    with(|e| e.request_mark_dirty())
}

/// Permanently freezes `id` as a constant, independent of the automatic
/// freeze a zero-subject recompute triggers.
pub fn freeze(id: Symbol) {
    with(|e| e.freeze(id))
}

/// Sets the cycle convergence iteration budget (default 100).
pub fn set_convergence_budget(budget: u32) {
    with(|e| e.set_convergence_budget(budget))
}

/// Runs `f` in a new atomic section, or joins the currently open one if
/// called while already inside `atomically`.
pub fn atomically<T>(f: impl FnOnce() -> T) -> Result<T, TrellisError> {
    with(|e| e.atomically(f))
}

/// Registers a resource whose `enter`/`exit` hooks bracket the current
/// atomic section's lifetime.
pub fn manage(manager: Rc<dyn ScopeManager>) {
    with(|e| e.manage(manager))
}

/// Registers an action to run, in reverse order with its siblings, if the
/// current atomic section aborts.
pub fn on_undo(f: impl FnOnce() + 'static) {
    with(|e| e.on_undo(Box::new(f)))
}

/// Captures a position in the undo log that [`rollback_to`] can return to.
pub fn savepoint() -> usize {
    with(|e| e.savepoint())
}

/// Runs every undo action recorded since `sp`, most recent first, without
/// aborting the enclosing atomic section.
pub fn rollback_to(sp: usize) {
    with(|e| e.rollback_to(sp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_atomically_joins_the_outer_section() {
        let depth_before = current_section_id();
        let result = atomically(|| {
            atomically(|| 1 + 1).expect("inner join should not open a new section")
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(current_section_id(), depth_before + 1);
    }

    #[test]
    fn abort_replays_undo_log_in_reverse() {
        let trace = Rc::new(RefCell::new(Vec::<i32>::new()));
        let t1 = Rc::clone(&trace);
        let t2 = Rc::clone(&trace);
        let result = atomically(|| {
            on_undo(move || t1.borrow_mut().push(1));
            on_undo(move || t2.borrow_mut().push(2));
            abort_section(TrellisError::User(UserError {
                message: "boom".into(),
            }));
        });
        assert!(result.is_err());
        assert_eq!(*trace.borrow(), vec![2, 1]);
    }

    #[test]
    fn savepoint_rolls_back_partially() {
        let trace = Rc::new(RefCell::new(Vec::<i32>::new()));
        atomically(|| {
            let t1 = Rc::clone(&trace);
            on_undo(move || t1.borrow_mut().push(1));
            let sp = savepoint();
            let t2 = Rc::clone(&trace);
            on_undo(move || t2.borrow_mut().push(2));
            rollback_to(sp);
        })
        .unwrap();
        assert_eq!(*trace.borrow(), vec![2]);
    }

    #[test]
    fn run_tracked_collects_distinct_subjects_in_discovery_order() {
        let a = next_id();
        let b = next_id();
        let listener = next_id();
        let (value, touched, _flags) = run_tracked(listener, || {
            record_dependency(a);
            record_dependency(b);
            record_dependency(a);
            record_dependency(listener); // self-reads are never recorded
            42
        });
        assert_eq!(value, 42);
        assert_eq!(touched, vec![a, b]);
    }
}
