//! Declarative cell-backed attributes for plain Rust objects.
//!
//! A Rust struct has no runtime-mutable class dictionary, so unlike a
//! descriptor-based attribute system, attribute *declarations* here are just
//! ordinary methods on the owning type; what this module provides is the
//! per-instance cell cache those methods share, plus a handful of
//! constructors (`attr`, `compute`, `maintain`, `perform`, `todo`, `make`)
//! that each lazily create (and remember) exactly one cell per attribute
//! name, the first time an instance's accessor method is called.
//!
//! A typical owning type looks like:
//!
//! ```
//! use trellis::attr::AttrCache;
//! use trellis::Cell;
//!
//! struct Thermostat {
//!     cells: AttrCache,
//! }
//!
//! impl Thermostat {
//!     fn setpoint(&self) -> Cell<f64> {
//!         trellis::attr::attr(&self.cells, "setpoint", 20.0)
//!     }
//! }
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use trellis_runtime::TrellisError;

use crate::cell::Cell;
use crate::error::InvalidOperation;

/// The per-instance store backing an object's attribute cells. One field of
/// this type, added to a struct, is all that's needed to make every method
/// built from [`attr`], [`compute`], [`maintain`], [`perform`], [`todo`] or
/// [`make`] return the *same* cell across repeated calls on the same
/// instance.
#[derive(Default)]
pub struct AttrCache {
    cells: RefCell<HashMap<&'static str, Box<dyn Any>>>,
}

impl AttrCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create<T: Clone + 'static>(&self, name: &'static str, build: impl FnOnce() -> T) -> T {
        if let Some(existing) = self.cells.borrow().get(name) {
            return existing
                .downcast_ref::<T>()
                .expect("attribute accessed at a different type than it was first created with")
                .clone();
        }
        let value = build();
        self.cells.borrow_mut().insert(name, Box::new(value.clone()));
        value
    }

    /// Materializes `name`'s cell immediately by calling `accessor` once,
    /// rather than waiting for the first external read. Use this right
    /// after constructing the owning object for attributes that should be
    /// eagerly live (e.g. an observer that must run even if nothing ever
    /// reads it); everything else activates lazily, on first access, by
    /// default.
    pub fn activate<T>(&self, accessor: impl FnOnce() -> T) {
        let _ = accessor();
    }
}

/// A plain writable attribute with a default value.
pub fn attr<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    default: T,
) -> Cell<T> {
    cache.get_or_create(name, || Cell::new_value(default))
}

/// Constructor-time overrides for [`attr`].
pub struct AttrOverride<T> {
    pub initial: T,
    /// Freezes the cell to a [`crate::CellKind::Constant`] right after
    /// construction, the cell-kernel equivalent of a subclass constructor
    /// pinning an otherwise-writable attribute.
    pub frozen: bool,
}

/// Like [`attr`], but accepting constructor-time overrides (an explicit
/// initial value, or immediate freezing to a constant).
pub fn attr_with<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    over: AttrOverride<T>,
) -> Cell<T> {
    cache.get_or_create(name, || {
        let cell = Cell::new_value(over.initial);
        if over.frozen {
            cell.set_to_constant();
        }
        cell
    })
}

/// A read-only attribute recomputed from other cells. `initial` seeds the
/// value visible before the first recompute settles.
pub fn compute<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    initial: T,
    rule: impl FnMut() -> T + 'static,
) -> Cell<T> {
    cache.get_or_create(name, || Cell::new_computed(initial, rule))
}

/// A side-effecting attribute with no meaningful value, run for its output
/// (logging, a UI redraw, an I/O write) rather than read by anything else.
pub fn perform(cache: &AttrCache, name: &'static str, rule: impl FnMut() + 'static) -> Cell<()> {
    cache.get_or_create(name, || Cell::<()>::new_observer(rule))
}

/// A [`todo`] attribute's handle: a pulse, not a level, with a `.future()`
/// view onto the value it's about to commit to for this sweep.
#[derive(Clone)]
pub struct Todo<T: Clone + PartialEq + fmt::Debug + 'static> {
    cell: Cell<T>,
    pending: Rc<RefCell<Option<T>>>,
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Todo<T> {
    pub fn read(&self) -> T {
        self.cell.read()
    }

    /// Writes `value`. Several writes within the same modifier collapse
    /// into the single commit at that section's end, the way
    /// [`crate::attr::Todo::future`] needs them to so each write builds on
    /// the last rather than conflicting with it.
    pub fn write(&self, value: T) -> Result<(), TrellisError> {
        *self.pending.borrow_mut() = Some(value);
        let this = self.clone();
        if trellis_runtime::in_rule() || trellis_runtime::in_section() {
            trellis_runtime::defer_write(self.cell.symbol(), Box::new(move || this.commit_pending()));
            Ok(())
        } else {
            trellis_runtime::atomically(move || this.commit_pending())
        }
    }

    fn commit_pending(&self) {
        if let Some(value) = self.pending.borrow_mut().take() {
            self.cell.write(value).expect("Todo's backing cell is never frozen");
        }
    }

    /// The value this attribute is about to commit to for the currently
    /// open modifier: `default` the first time anything asks this sweep,
    /// then whatever the most recent `.write()` in this sweep set. Callable
    /// only from inside a modifier.
    pub fn future(&self) -> Result<T, TrellisError> {
        if !trellis_runtime::in_section() {
            return Err(InvalidOperation::FutureOutsideModifier.into());
        }
        if let Some(value) = self.pending.borrow().clone() {
            return Ok(value);
        }
        Ok(self.cell.read())
    }
}

/// A value that resets to `default` one mini-sweep after it last changed —
/// a pulse, not a level. Written directly, like [`attr`], but never
/// retains a value across sweeps on its own. `Todo::future` is the only way
/// to see a mutation made earlier in the same modifier before it commits.
pub fn todo<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    default: T,
) -> Todo<T> {
    cache.get_or_create(name, || Todo {
        cell: Cell::new_discrete(default),
        pending: Rc::new(RefCell::new(None)),
    })
}

thread_local! {
    static INHERITED_RULES: RefCell<HashMap<(&'static str, &'static str), Box<dyn Any>>> =
        RefCell::new(HashMap::new());
}

/// Registers `class`'s own rule for `name` in the per-class inherited-rule
/// registry, so a subclass's own rule for the same attribute name can look
/// it up later by `(class, name)` and call through to it — the name-keyed
/// stand-in for `super.name()` a Rust struct hierarchy has no other way to
/// express, since there's no runtime type hierarchy to walk.
pub fn register_rule<T: 'static>(class: &'static str, name: &'static str, rule: impl Fn() -> T + 'static) {
    let boxed: Box<dyn Fn() -> T> = Box::new(rule);
    INHERITED_RULES.with(|rules| {
        rules.borrow_mut().insert((class, name), Box::new(boxed));
    });
}

/// Looks up and calls the rule `class` registered for `name` via
/// [`register_rule`] (or [`compute_for_class`]). Panics if nothing was
/// registered under that key, or if it was registered at a different type
/// than `T` — both are authoring mistakes, not conditions a caller can
/// recover from.
pub fn inherited_rule<T: 'static>(class: &'static str, name: &'static str) -> T {
    INHERITED_RULES.with(|rules| {
        let rules = rules.borrow();
        let boxed = rules
            .get(&(class, name))
            .unwrap_or_else(|| panic!("no inherited rule registered for {class}::{name}"));
        let rule = boxed
            .downcast_ref::<Box<dyn Fn() -> T>>()
            .expect("inherited rule looked up at a different type than it was registered with");
        rule()
    })
}

/// Like [`compute`], but also files `rule` under `(class, name)` in the
/// per-class inherited-rule registry, so a subclass overriding this
/// attribute can reach this version through [`inherited_rule`] rather than
/// losing it the way a plain name collision would.
pub fn compute_for_class<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    class: &'static str,
    name: &'static str,
    initial: T,
    rule: impl Fn() -> T + Clone + 'static,
) -> Cell<T> {
    register_rule(class, name, rule.clone());
    cache.get_or_create(name, || Cell::new_computed(initial, move || rule()))
}

/// A value built exactly once, the first time this accessor runs, then
/// frozen — the cell-kernel equivalent of a memoized, immutable property.
pub fn make<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    build: impl FnOnce() -> T,
) -> Cell<T> {
    cache.get_or_create(name, || Cell::new_constant(build()))
}

/// A cell-backed attribute that looks computed from the outside but still
/// accepts external writes: each write proposes a candidate, and `rule`
/// folds that candidate against the attribute's own settled value to
/// decide what's actually stored (clamping, validation, accumulation...).
#[derive(Clone)]
pub struct Maintained<T: Clone + PartialEq + fmt::Debug + 'static> {
    backing: Cell<T>,
    settled: Cell<T>,
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Maintained<T> {
    pub fn read(&self) -> T {
        self.settled.read()
    }

    /// Proposes `value`; `rule` (supplied to [`maintain`]) decides how it's
    /// folded into the settled value.
    pub fn write(&self, value: T) -> Result<(), TrellisError> {
        self.backing.write(value)
    }
}

/// Builds a [`Maintained`] attribute: `rule` receives each proposed value in
/// turn (starting from `initial`) and returns what should actually be
/// stored.
pub fn maintain<T: Clone + PartialEq + fmt::Debug + 'static>(
    cache: &AttrCache,
    name: &'static str,
    initial: T,
    mut rule: impl FnMut(T) -> T + 'static,
) -> Maintained<T> {
    cache.get_or_create(name, || {
        let backing = Cell::new_value(initial.clone());
        let reader = backing.clone();
        let settled = Cell::new_computed(initial, move || rule(reader.read()));
        Maintained { backing, settled }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_is_unreachable_outside_a_modifier() {
        let cache = AttrCache::new();
        let pulse = todo(&cache, "pulse", 0i32);
        assert!(matches!(pulse.future(), Err(TrellisError::Invalid(_))));
    }

    #[test]
    fn repeated_writes_within_one_modifier_accumulate_into_future() {
        let cache = AttrCache::new();
        let pulse = todo(&cache, "pulse", 0i32);
        crate::modifier(|| {
            pulse.write(1).unwrap();
            assert_eq!(pulse.future().unwrap(), 1);
            pulse.write(2).unwrap();
            assert_eq!(pulse.future().unwrap(), 2, "second write builds on the first, not a conflict");
        })
        .unwrap();
        assert_eq!(pulse.read(), 2);
    }

    #[test]
    fn future_sees_the_settled_value_before_any_write_this_sweep() {
        let cache = AttrCache::new();
        let pulse = todo(&cache, "pulse", 5i32);
        crate::modifier(|| {
            assert_eq!(pulse.future().unwrap(), 5);
        })
        .unwrap();
    }

    #[test]
    fn subclass_rule_reaches_its_parent_by_name() {
        let cache = AttrCache::new();
        let base = compute_for_class(&cache, "Base", "describe", String::new(), || "base".to_string());
        assert_eq!(base.read(), "base");

        let derived_cache = AttrCache::new();
        let derived = compute_for_class(&derived_cache, "Derived", "describe", String::new(), || {
            format!("{}+derived", inherited_rule::<String>("Base", "describe"))
        });
        assert_eq!(derived.read(), "base+derived");
    }
}
