//! The typed cell kernel: every rule-bearing and plain-value cell in a
//! graph is one `Cell<T>`, distinguished only by its [`CellKind`] and
//! whether it carries a rule closure.

use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

pub use trellis_runtime::CellKind;
use trellis_runtime::{ErasedCell, RecomputeOutcome, RunFlags, Symbol, TrellisError};

use crate::error::{ConflictError, ReadOnlyError};

struct PendingWrite<T> {
    section: u64,
    value: T,
}

struct Inner<T: Clone + PartialEq + fmt::Debug + 'static> {
    symbol: Symbol,
    kind: StdCell<CellKind>,
    value: RefCell<T>,
    default: Option<T>,
    rule: Option<RefCell<Box<dyn FnMut() -> T>>>,
    pending_write: RefCell<Option<PendingWrite<T>>>,
    /// An effector's write-through sink, if this cell was built by
    /// [`Cell::new_connected_effector`]. Its presence is what makes `write`
    /// call out instead of committing a value.
    sink: RefCell<Option<Box<dyn FnMut(T)>>>,
}

/// Connects one sensor or effector's lifetime to an external subscription:
/// `connect` runs the first time it gains a listener, `disconnect` once its
/// last one drops. Type-erased over the connection key `K` so the engine
/// can hold it without knowing what kind of key any given sensor uses.
struct SensorConnection<K> {
    connect: RefCell<Box<dyn FnMut() -> K>>,
    disconnect: RefCell<Box<dyn FnMut(K)>>,
    key: RefCell<Option<K>>,
}

impl<K: 'static> SensorConnection<K> {
    fn new(connect: impl FnMut() -> K + 'static, disconnect: impl FnMut(K) + 'static) -> Self {
        Self {
            connect: RefCell::new(Box::new(connect)),
            disconnect: RefCell::new(Box::new(disconnect)),
            key: RefCell::new(None),
        }
    }
}

impl<K: 'static> trellis_runtime::SensorHooks for SensorConnection<K> {
    fn connect_if_needed(&self) {
        if self.key.borrow().is_none() {
            let key = (self.connect.borrow_mut())();
            *self.key.borrow_mut() = Some(key);
        }
    }

    fn disconnect_if_needed(&self) {
        if let Some(key) = self.key.borrow_mut().take() {
            (self.disconnect.borrow_mut())(key);
        }
    }
}

/// A single reactive memory cell.
///
/// `Cell<T>` is the one concrete type behind every kind named in
/// [`CellKind`]: a plain [`CellKind::Value`], a rule-driven
/// [`CellKind::Computed`], a side-effecting [`CellKind::Observer`] or
/// [`CellKind::Effector`], a sweep-local [`CellKind::Discrete`], an
/// externally-driven [`CellKind::Sensor`], or a permanently frozen
/// [`CellKind::Constant`]. Cloning a `Cell` clones the handle, not the
/// storage — all clones observe the same underlying cell.
pub struct Cell<T: Clone + PartialEq + fmt::Debug + 'static> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Cell<T> {
    fn build(kind: CellKind, initial: T, default: Option<T>, rule: Option<Box<dyn FnMut() -> T>>) -> Self {
        let symbol = trellis_runtime::next_id();
        let inner = Rc::new(Inner {
            symbol,
            kind: StdCell::new(kind),
            value: RefCell::new(initial),
            default,
            rule: rule.map(RefCell::new),
            pending_write: RefCell::new(None),
            sink: RefCell::new(None),
        });
        let dyn_inner: Rc<dyn ErasedCell> = inner.clone();
        let weak: Weak<dyn ErasedCell> = Rc::downgrade(&dyn_inner);
        trellis_runtime::register(symbol, kind, weak);
        if inner.rule.is_some() {
            trellis_runtime::ensure_recalc(symbol);
        }
        Cell { inner }
    }

    /// A plain writable cell with no rule.
    pub fn new_value(initial: T) -> Self {
        Self::build(CellKind::Value, initial, None, None)
    }

    /// An externally-driven input cell. `read` is this cell's rule, pulling
    /// the current value from outside; `connect` fires lazily the first
    /// time the sensor acquires a listener, and `disconnect` once its last
    /// listener drops, so the external subscription only lives as long as
    /// something is actually watching. The callbacks run inside an implicit
    /// atomic section but never form dependencies of their own.
    pub fn new_sensor<K: 'static>(
        connect: impl FnMut() -> K + 'static,
        disconnect: impl FnMut(K) + 'static,
        read: impl FnMut() -> T + 'static,
    ) -> Self
    where
        T: Default,
    {
        let cell = Self::build(CellKind::Sensor, T::default(), None, Some(Box::new(read)));
        trellis_runtime::register_sensor_hooks(
            cell.inner.symbol,
            Rc::new(SensorConnection::new(connect, disconnect)),
        );
        cell
    }

    /// A cell permanently frozen to `value`, with no rule and no write
    /// access.
    pub fn new_constant(value: T) -> Self {
        Self::build(CellKind::Constant, value, None, None)
    }

    /// A cell whose value snaps back to `default` one mini-sweep after it
    /// last changed, with no driving rule — callers write it directly (e.g.
    /// a line-received pulse).
    pub fn new_discrete(default: T) -> Self {
        Self::build(CellKind::Discrete, default.clone(), Some(default), None)
    }

    /// A cell whose value snaps back to `default` one mini-sweep after it
    /// last changed, computed from a rule (e.g. a new-high detector).
    pub fn new_discrete_computed(default: T, rule: impl FnMut() -> T + 'static) -> Self {
        Self::build(CellKind::Discrete, default.clone(), Some(default), Some(Box::new(rule)))
    }

    /// A cell whose value is recomputed from `rule` whenever a subject it
    /// reads changes. `initial` seeds the value shown before the first
    /// recompute completes (observable only if something reads it from
    /// inside that very first run, which self-reads allow).
    pub fn new_computed(initial: T, rule: impl FnMut() -> T + 'static) -> Self {
        Self::build(CellKind::Computed, initial, None, Some(Box::new(rule)))
    }

    /// A side-effecting rule with no meaningful return value, conventionally
    /// used for output/logging rather than writing other cells (though
    /// nothing stops it — see [`Cell::new_effector`] for the idiom that
    /// does).
    pub fn new_observer(mut rule: impl FnMut() + 'static) -> Cell<()> {
        Cell::<()>::build(CellKind::Observer, (), None, Some(Box::new(move || rule())))
    }

    /// Like [`Cell::new_observer`], but named for the idiom of a rule that
    /// writes other cells as its purpose rather than as a side effect.
    pub fn new_effector(mut rule: impl FnMut() + 'static) -> Cell<()> {
        Cell::<()>::build(CellKind::Effector, (), None, Some(Box::new(move || rule())))
    }

    /// A [`Cell::new_sensor`] with a writable side: `read`/`connect`/
    /// `disconnect` behave exactly as they do there, but a `write` to this
    /// cell doesn't commit a value at all — it calls `sink` instead, the
    /// same way the connect/disconnect lifecycle calls out rather than
    /// touching the dependency graph. `read()` still only ever reflects
    /// what `read` pulled.
    pub fn new_connected_effector<K: 'static>(
        connect: impl FnMut() -> K + 'static,
        disconnect: impl FnMut(K) + 'static,
        read: impl FnMut() -> T + 'static,
        sink: impl FnMut(T) + 'static,
    ) -> Self
    where
        T: Default,
    {
        let cell = Self::build(CellKind::Effector, T::default(), None, Some(Box::new(read)));
        trellis_runtime::register_sensor_hooks(
            cell.inner.symbol,
            Rc::new(SensorConnection::new(connect, disconnect)),
        );
        *cell.inner.sink.borrow_mut() = Some(Box::new(sink));
        cell
    }

    pub fn symbol(&self) -> Symbol {
        self.inner.symbol
    }

    pub fn kind(&self) -> CellKind {
        self.inner.kind.get()
    }

    /// Reads this cell's value, recomputing it first if it (or one of its
    /// subjects, recursively) is stale.
    ///
    /// A rule reading its own cell never recurses into its own recompute:
    /// it sees the value as of the end of the previous successful run —
    /// its own rule body holds `value` unmodified until the run completes.
    pub fn read(&self) -> T {
        let symbol = self.inner.symbol;
        if trellis_runtime::is_current(symbol) {
            return self.inner.value.borrow().clone();
        }
        trellis_runtime::freshen(symbol);
        trellis_runtime::record_dependency(symbol);
        self.inner.value.borrow().clone()
    }

    /// Writes a new value. If called from within a running rule, the write
    /// is deferred until that rule returns; otherwise it runs immediately,
    /// inside a new atomic section (or the currently open one, if any).
    pub fn write(&self, new_value: T) -> Result<(), TrellisError> {
        if matches!(self.kind(), CellKind::Constant) {
            return Err(TrellisError::ReadOnly(ReadOnlyError {
                symbol: self.inner.symbol,
                reason: "constant cells cannot be written",
            }));
        }
        if self.inner.sink.borrow().is_some() {
            let inner = Rc::clone(&self.inner);
            return if trellis_runtime::in_rule() {
                trellis_runtime::defer_write(
                    self.inner.symbol,
                    Box::new(move || inner.call_sink(new_value)),
                );
                Ok(())
            } else {
                trellis_runtime::atomically(move || inner.call_sink(new_value))
            };
        }
        if trellis_runtime::in_rule() {
            let inner = Rc::clone(&self.inner);
            trellis_runtime::defer_write(
                self.inner.symbol,
                Box::new(move || {
                    inner.commit_external_write(new_value);
                }),
            );
            Ok(())
        } else {
            let inner = Rc::clone(&self.inner);
            trellis_runtime::atomically(move || inner.commit_external_write(new_value))
        }
    }

    /// Permanently freezes this cell as a [`CellKind::Constant`] holding its
    /// current value.
    pub fn set_to_constant(&self) {
        self.inner.kind.set(CellKind::Constant);
        trellis_runtime::freeze(self.inner.symbol);
    }

    /// Forces this cell to be recomputed on the next sweep even though none
    /// of its subjects have changed.
    pub fn ensure_recalc(&self) {
        trellis_runtime::ensure_recalc(self.inner.symbol);
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Inner<T> {
    fn call_sink(&self, value: T) {
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            sink(value);
        }
    }

    fn commit_external_write(self: Rc<Self>, new_value: T) {
        if matches!(self.kind.get(), CellKind::Constant) {
            trellis_runtime::abort_section(TrellisError::ReadOnly(ReadOnlyError {
                symbol: self.symbol,
                reason: "constant cells cannot be written",
            }));
        }
        let section = trellis_runtime::current_section_id();
        {
            let pw = self.pending_write.borrow();
            if let Some(p) = pw.as_ref() {
                if p.section == section {
                    if p.value != new_value {
                        let old = p.value.clone();
                        drop(pw);
                        trellis_runtime::abort_section(TrellisError::Conflict(ConflictError::Values {
                            symbol: self.symbol,
                            old: format!("{old:?}"),
                            new: format!("{new_value:?}"),
                        }));
                    }
                    return;
                }
            }
        }
        let old = self.value.borrow().clone();
        *self.pending_write.borrow_mut() = Some(PendingWrite {
            section,
            value: new_value.clone(),
        });
        if old == new_value {
            return;
        }
        *self.value.borrow_mut() = new_value;
        let weak = Rc::downgrade(&self);
        trellis_runtime::on_undo(move || {
            if let Some(inner) = weak.upgrade() {
                *inner.value.borrow_mut() = old.clone();
            }
        });
        trellis_runtime::propagate_external_write(self.symbol);
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> ErasedCell for Inner<T> {
    fn kind(&self) -> CellKind {
        self.kind.get()
    }

    fn recompute(&self, known_layer: u32) -> RecomputeOutcome {
        let rule = match &self.rule {
            Some(rule) => rule,
            None => {
                return RecomputeOutcome {
                    changed: false,
                    new_layer: known_layer,
                    subjects: Vec::new(),
                    became_constant: false,
                    flags: RunFlags::default(),
                }
            }
        };
        let symbol = self.symbol;
        let (new_value, touched, flags) = trellis_runtime::run_tracked(symbol, || {
            let mut r = rule.borrow_mut();
            (r)()
        });
        let new_layer = trellis_runtime::layer_for_subjects(&touched);
        if new_layer > known_layer {
            return RecomputeOutcome {
                changed: false,
                new_layer,
                subjects: touched,
                became_constant: false,
                flags,
            };
        }
        let old = self.value.borrow().clone();
        let changed = old != new_value;
        if changed {
            *self.value.borrow_mut() = new_value;
        }
        let became_constant = touched.is_empty()
            && !matches!(
                self.kind.get(),
                CellKind::Observer | CellKind::Effector | CellKind::Discrete | CellKind::Sensor
            );
        RecomputeOutcome {
            changed,
            new_layer,
            subjects: touched,
            became_constant,
            flags,
        }
    }

    fn reset_to_default(&self) -> bool {
        let default = self
            .default
            .clone()
            .expect("reset_to_default called on a non-discrete cell");
        let mut v = self.value.borrow_mut();
        if *v != default {
            *v = default;
            true
        } else {
            false
        }
    }

    fn freeze_to_constant(&self) {
        self.kind.set(CellKind::Constant);
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Drop for Inner<T> {
    fn drop(&mut self) {
        trellis_runtime::purge(self.symbol);
    }
}
