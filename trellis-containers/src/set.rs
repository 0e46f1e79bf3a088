//! `MutSet`: an observable, unordered set.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use trellis::{Cell, InvalidOperation, TrellisError};

/// Bounds shared by every `MutSet<T>` element type.
pub trait SetElem: Eq + Hash + Clone + fmt::Debug + 'static {}
impl<T: Eq + Hash + Clone + fmt::Debug + 'static> SetElem for T {}

#[derive(Clone)]
enum SetOp<T> {
    Add(T),
    Discard(T),
}

#[derive(Clone)]
pub struct MutSet<T: SetElem> {
    state: Cell<Rc<HashSet<T>>>,
    pending: Rc<RefCell<Vec<SetOp<T>>>>,
    added: Cell<Vec<T>>,
    removed: Cell<Vec<T>>,
}

impl<T: SetElem> Default for MutSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SetElem> MutSet<T> {
    pub fn new() -> Self {
        Self {
            state: Cell::new_value(Rc::new(HashSet::new())),
            pending: Rc::new(RefCell::new(Vec::new())),
            added: Cell::new_discrete(Vec::new()),
            removed: Cell::new_discrete(Vec::new()),
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.state.read().contains(value)
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Rc<HashSet<T>> {
        self.state.read()
    }

    pub fn added(&self) -> Cell<Vec<T>> {
        self.added.clone()
    }

    pub fn removed(&self) -> Cell<Vec<T>> {
        self.removed.clone()
    }

    pub fn add(&self, value: T) -> Result<(), TrellisError> {
        self.apply(SetOp::Add(value))
    }

    pub fn discard(&self, value: T) -> Result<(), TrellisError> {
        self.apply(SetOp::Discard(value))
    }

    /// Forbidden: removing and returning an arbitrary element bundles a read
    /// and a write into one operation. Read an element via [`MutSet::snapshot`]
    /// and then [`MutSet::discard`] it instead.
    pub fn pop(&self) -> Result<Option<T>, TrellisError> {
        Err(InvalidOperation::ReadWriteSameOperation("MutSet::pop").into())
    }

    /// The set as it will read once every mutation queued so far in the
    /// currently open modifier commits. Only callable from within an open
    /// modifier.
    pub fn future(&self) -> Result<Rc<HashSet<T>>, TrellisError> {
        if !trellis_runtime::in_section() {
            return Err(InvalidOperation::FutureOutsideModifier.into());
        }
        let mut set = (*self.state.read()).clone();
        for op in self.pending.borrow().iter() {
            match op.clone() {
                SetOp::Add(v) => {
                    set.insert(v);
                }
                SetOp::Discard(v) => {
                    set.remove(&v);
                }
            }
        }
        Ok(Rc::new(set))
    }

    fn apply(&self, op: SetOp<T>) -> Result<(), TrellisError> {
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
        let ops: Vec<SetOp<T>> = self.pending.borrow_mut().drain(..).collect();
        if ops.is_empty() {
            return;
        }
        let mut set = (*self.state.read()).clone();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for op in ops {
            match op {
                SetOp::Add(v) => {
                    if set.insert(v.clone()) {
                        added.push(v);
                    }
                }
                SetOp::Discard(v) => {
                    if set.remove(&v) {
                        removed.push(v);
                    }
                }
            }
        }
        self.state
            .write(Rc::new(set))
            .expect("MutSet's backing cell is never frozen");
        if !added.is_empty() {
            self.added.write(added).expect("discrete signal cell is never frozen");
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
    fn add_and_discard_batch_into_one_commit() {
        let set: MutSet<&'static str> = MutSet::new();
        trellis::modifier(|| {
            set.add("a").unwrap();
            set.add("b").unwrap();
        })
        .unwrap();
        assert!(set.contains(&"a"));
        assert!(set.contains(&"b"));
        trellis::modifier(|| set.discard("a").unwrap()).unwrap();
        assert!(!set.contains(&"a"));
        assert_eq!(set.removed().read(), vec!["a"]);
    }

    #[test]
    fn pop_is_rejected() {
        let set: MutSet<&'static str> = MutSet::new();
        assert!(matches!(
            set.pop(),
            Err(TrellisError::Invalid(InvalidOperation::ReadWriteSameOperation(_)))
        ));
    }
}
