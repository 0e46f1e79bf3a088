//! `MutSeq`: an observable, order-preserving sequence.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use trellis::{Cell, InvalidOperation, TrellisError};

/// Bounds shared by every `MutSeq<T>` element type.
pub trait SeqElem: Clone + PartialEq + fmt::Debug + 'static {}
impl<T: Clone + PartialEq + fmt::Debug + 'static> SeqElem for T {}

#[derive(Clone)]
enum SeqOp<T> {
    Push(T),
    InsertAt(usize, T),
    RemoveAt(usize),
    Clear,
}

#[derive(Clone)]
pub struct MutSeq<T: SeqElem> {
    state: Cell<Rc<Vec<T>>>,
    pending: Rc<RefCell<Vec<SeqOp<T>>>>,
    added: Cell<Vec<T>>,
    removed: Cell<Vec<T>>,
}

impl<T: SeqElem> Default for MutSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SeqElem> MutSeq<T> {
    pub fn new() -> Self {
        Self {
            state: Cell::new_value(Rc::new(Vec::new())),
            pending: Rc::new(RefCell::new(Vec::new())),
            added: Cell::new_discrete(Vec::new()),
            removed: Cell::new_discrete(Vec::new()),
        }
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.state.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Rc<Vec<T>> {
        self.state.read()
    }

    pub fn added(&self) -> Cell<Vec<T>> {
        self.added.clone()
    }

    pub fn removed(&self) -> Cell<Vec<T>> {
        self.removed.clone()
    }

    pub fn push(&self, value: T) -> Result<(), TrellisError> {
        self.apply(SeqOp::Push(value))
    }

    pub fn insert_at(&self, index: usize, value: T) -> Result<(), TrellisError> {
        self.apply(SeqOp::InsertAt(index, value))
    }

    pub fn remove_at(&self, index: usize) -> Result<(), TrellisError> {
        self.apply(SeqOp::RemoveAt(index))
    }

    pub fn clear(&self) -> Result<(), TrellisError> {
        self.apply(SeqOp::Clear)
    }

    /// Forbidden: returning the removed element and removing it are a read
    /// and a write bundled into one operation. Call [`MutSeq::get`] with the
    /// last index, then [`MutSeq::remove_at`], instead.
    pub fn pop(&self) -> Result<Option<T>, TrellisError> {
        Err(InvalidOperation::ReadWriteSameOperation("MutSeq::pop").into())
    }

    /// The sequence as it will read once every mutation queued so far in
    /// the currently open modifier commits. Only callable from within an
    /// open modifier.
    pub fn future(&self) -> Result<Rc<Vec<T>>, TrellisError> {
        if !trellis_runtime::in_section() {
            return Err(InvalidOperation::FutureOutsideModifier.into());
        }
        let mut items = (*self.state.read()).clone();
        for op in self.pending.borrow().iter() {
            apply_one(&mut items, op.clone());
        }
        Ok(Rc::new(items))
    }

    fn apply(&self, op: SeqOp<T>) -> Result<(), TrellisError> {
        self.pending.borrow_mut().push(op);
        let this = self.clone();
        // A rule defers to the end of its own run; a bare modifier with an
        // already-open section defers to the end of the section instead of
        // committing immediately, so a second call in the same section sees
        // its op queued rather than racing a fresh commit against it.
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
        let ops: Vec<SeqOp<T>> = self.pending.borrow_mut().drain(..).collect();
        if ops.is_empty() {
            return;
        }
        let mut items = (*self.state.read()).clone();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for op in ops {
            match op.clone() {
                SeqOp::RemoveAt(index) => {
                    if index < items.len() {
                        removed.push(items.remove(index));
                    }
                }
                SeqOp::Clear => {
                    removed.append(&mut items.clone());
                    items.clear();
                }
                _ => {
                    let before = items.len();
                    apply_one(&mut items, op);
                    if items.len() > before {
                        added.push(items[items.len() - 1].clone());
                    }
                }
            }
        }
        self.state
            .write(Rc::new(items))
            .expect("MutSeq's backing cell is never frozen");
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

fn apply_one<T: SeqElem>(items: &mut Vec<T>, op: SeqOp<T>) {
    match op {
        SeqOp::Push(value) => items.push(value),
        SeqOp::InsertAt(index, value) => {
            let index = index.min(items.len());
            items.insert(index, value);
        }
        SeqOp::RemoveAt(index) => {
            if index < items.len() {
                items.remove(index);
            }
        }
        SeqOp::Clear => items.clear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_remove_batches_into_one_commit() {
        let seq: MutSeq<i32> = MutSeq::new();
        trellis::modifier(|| {
            seq.push(1).unwrap();
            seq.push(2).unwrap();
            seq.push(3).unwrap();
        })
        .unwrap();
        assert_eq!(*seq.snapshot(), vec![1, 2, 3]);
        trellis::modifier(|| seq.remove_at(0).unwrap()).unwrap();
        assert_eq!(*seq.snapshot(), vec![2, 3]);
        assert_eq!(seq.removed().read(), vec![1]);
    }

    #[test]
    fn pop_is_rejected() {
        let seq: MutSeq<i32> = MutSeq::new();
        assert!(matches!(
            seq.pop(),
            Err(TrellisError::Invalid(InvalidOperation::ReadWriteSameOperation(_)))
        ));
    }
}
