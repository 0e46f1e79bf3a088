//! `MutMap`: an observable key/value map.
//!
//! Reads go straight to a settled [`Cell`] snapshot, so reading a `MutMap`
//! participates in dependency tracking exactly like reading any other cell.
//! Mutations queue onto a pending log and land as one batch when the
//! enclosing modifier commits, so a rule that inserts three keys triggers
//! exactly one change to the map's listeners, not three.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use trellis::{Cell, InvalidOperation, TrellisError};

#[derive(Clone)]
enum MapOp<K, V> {
    Insert(K, V),
    Remove(K),
}

/// Bounds shared by every `MutMap<K, V>` key and value type.
pub trait MapKey: Eq + Hash + Clone + fmt::Debug + 'static {}
impl<T: Eq + Hash + Clone + fmt::Debug + 'static> MapKey for T {}

pub trait MapValue: Clone + PartialEq + fmt::Debug + 'static {}
impl<T: Clone + PartialEq + fmt::Debug + 'static> MapValue for T {}

#[derive(Clone)]
pub struct MutMap<K: MapKey, V: MapValue> {
    state: Cell<Rc<HashMap<K, V>>>,
    pending: Rc<RefCell<Vec<MapOp<K, V>>>>,
    added: Cell<Vec<K>>,
    changed: Cell<Vec<K>>,
    removed: Cell<Vec<K>>,
}

impl<K: MapKey, V: MapValue> Default for MutMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: MapKey, V: MapValue> MutMap<K, V> {
    pub fn new() -> Self {
        Self {
            state: Cell::new_value(Rc::new(HashMap::new())),
            pending: Rc::new(RefCell::new(Vec::new())),
            added: Cell::new_discrete(Vec::new()),
            changed: Cell::new_discrete(Vec::new()),
            removed: Cell::new_discrete(Vec::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.state.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.state.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The settled snapshot as of the last committed sweep.
    pub fn snapshot(&self) -> Rc<HashMap<K, V>> {
        self.state.read()
    }

    /// Keys inserted or updated to a new value in the sweep just completed;
    /// empty once that sweep is over (a [`trellis::CellKind::Discrete`]
    /// signal).
    pub fn added(&self) -> Cell<Vec<K>> {
        self.added.clone()
    }

    pub fn changed(&self) -> Cell<Vec<K>> {
        self.changed.clone()
    }

    pub fn removed(&self) -> Cell<Vec<K>> {
        self.removed.clone()
    }

    pub fn insert(&self, key: K, value: V) -> Result<(), TrellisError> {
        self.apply(MapOp::Insert(key, value))
    }

    pub fn remove(&self, key: K) -> Result<(), TrellisError> {
        self.apply(MapOp::Remove(key))
    }

    /// Forbidden: returning the removed value and removing it are a read
    /// and a write bundled into one operation, which can't be honored under
    /// deferred-write semantics (the read would need to see a value the
    /// write hasn't settled yet). Call [`MutMap::get`] then
    /// [`MutMap::remove`] instead.
    pub fn pop(&self, _key: &K) -> Result<Option<V>, TrellisError> {
        Err(InvalidOperation::ReadWriteSameOperation("MutMap::pop").into())
    }

    /// Forbidden for the same reason as [`MutMap::pop`].
    pub fn popitem(&self) -> Result<Option<(K, V)>, TrellisError> {
        Err(InvalidOperation::ReadWriteSameOperation("MutMap::popitem").into())
    }

    /// Forbidden for the same reason as [`MutMap::pop`]: returning the
    /// effective value and conditionally inserting a default are bundled
    /// into one call. Call [`MutMap::get`] then [`MutMap::insert`] instead.
    pub fn setdefault(&self, _key: K, _default: V) -> Result<V, TrellisError> {
        Err(InvalidOperation::ReadWriteSameOperation("MutMap::setdefault").into())
    }

    /// The map as it will read once every mutation queued so far in the
    /// currently open modifier commits, without actually committing them.
    /// Only callable from within an open modifier.
    pub fn future(&self) -> Result<Rc<HashMap<K, V>>, TrellisError> {
        if !trellis_runtime::in_section() {
            return Err(InvalidOperation::FutureOutsideModifier.into());
        }
        let mut map = (*self.state.read()).clone();
        for op in self.pending.borrow().iter() {
            match op.clone() {
                MapOp::Insert(k, v) => {
                    map.insert(k, v);
                }
                MapOp::Remove(k) => {
                    map.remove(&k);
                }
            }
        }
        Ok(Rc::new(map))
    }

    fn apply(&self, op: MapOp<K, V>) -> Result<(), TrellisError> {
        self.pending.borrow_mut().push(op);
        let this = self.clone();
        // Deferring whenever a section is already open (not just inside a
        // rule) lets several direct calls in one bare `modifier` collapse
        // into the single commit at that section's end.
        if trellis_runtime::in_rule() || trellis_runtime::in_section() {
            trellis_runtime::defer_write(
                self.state.symbol(),
                Box::new(move || this.commit_pending()),
            );
            Ok(())
        } else {
            trellis_runtime::atomically(move || this.commit_pending())
        }
    }

    fn commit_pending(&self) {
        let ops: Vec<MapOp<K, V>> = self.pending.borrow_mut().drain(..).collect();
        if ops.is_empty() {
            return;
        }
        let mut map = (*self.state.read()).clone();
        let mut added = Vec::new();
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        for op in ops {
            match op {
                MapOp::Insert(k, v) => match map.insert(k.clone(), v.clone()) {
                    None => added.push(k),
                    Some(old) if old != v => changed.push(k),
                    Some(_) => {}
                },
                MapOp::Remove(k) => {
                    if map.remove(&k).is_some() {
                        removed.push(k);
                    }
                }
            }
        }
        self.state
            .write(Rc::new(map))
            .expect("MutMap's backing cell is never frozen");
        if !added.is_empty() {
            self.added.write(added).expect("discrete signal cell is never frozen");
        }
        if !changed.is_empty() {
            self.changed
                .write(changed)
                .expect("discrete signal cell is never frozen");
        }
        if !removed.is_empty() {
            self.removed
                .write(removed)
                .expect("discrete signal cell is never frozen");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batched_inserts_produce_one_settled_snapshot() {
        let map: MutMap<&'static str, i32> = MutMap::new();
        trellis::modifier(|| {
            map.insert("a", 1).unwrap();
            map.insert("b", 2).unwrap();
        })
        .unwrap();
        assert_eq!(map.get(&"a"), Some(1));
        assert_eq!(map.get(&"b"), Some(2));
        assert_eq!(map.added().read(), vec!["a", "b"]);
    }

    #[test]
    fn pop_is_rejected() {
        let map: MutMap<&'static str, i32> = MutMap::new();
        assert!(matches!(
            map.pop(&"a"),
            Err(TrellisError::Invalid(InvalidOperation::ReadWriteSameOperation(_)))
        ));
    }

    #[test]
    fn future_outside_modifier_errors() {
        let map: MutMap<&'static str, i32> = MutMap::new();
        assert!(matches!(
            map.future(),
            Err(TrellisError::Invalid(InvalidOperation::FutureOutsideModifier))
        ));
    }
}
