//! `Pipe`: a write-only broadcast channel of values pushed during one sweep.
//!
//! Unlike [`crate::map::MutMap`] or [`crate::seq::MutSeq`], a `Pipe` keeps no
//! settled state across sweeps at all; it is a thin, typed wrapper around a
//! [`trellis::CellKind::Discrete`] cell of a batch, since "fires with a batch
//! of values, then resets to empty" is exactly what a discrete cell already
//! does.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use trellis::{Cell, TrellisError};

/// Bounds shared by every `Pipe<T>` element type.
pub trait PipeElem: Clone + PartialEq + fmt::Debug + 'static {}
impl<T: Clone + PartialEq + fmt::Debug + 'static> PipeElem for T {}

#[derive(Clone)]
pub struct Pipe<T: PipeElem> {
    batch: Cell<Rc<Vec<T>>>,
    pending: Rc<RefCell<Vec<T>>>,
}

impl<T: PipeElem> Default for Pipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PipeElem> Pipe<T> {
    pub fn new() -> Self {
        Self {
            batch: Cell::new_discrete(Rc::new(Vec::new())),
            pending: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Sends one value. Multiple sends within the same modifier, or the same
    /// rule, collapse into a single batch delivered to readers this sweep —
    /// queued here and committed once, the way `MutSeq`/`MutMap`/`MutSet` do,
    /// rather than read-modify-writing `batch` on every call.
    pub fn send(&self, value: T) -> Result<(), TrellisError> {
        self.pending.borrow_mut().push(value);
        let this = self.clone();
        if trellis_runtime::in_rule() || trellis_runtime::in_section() {
            trellis_runtime::defer_write(
                self.batch.symbol(),
                Box::new(move || this.commit_pending()),
            );
            Ok(())
        } else {
            trellis_runtime::atomically(move || this.commit_pending())
        }
    }

    fn commit_pending(&self) {
        let values: Vec<T> = self.pending.borrow_mut().drain(..).collect();
        if values.is_empty() {
            return;
        }
        let mut batch = (*self.batch.read()).clone();
        batch.extend(values);
        self.batch
            .write(Rc::new(batch))
            .expect("Pipe's backing cell is never frozen");
    }

    /// The values sent during the sweep currently being read; empty outside
    /// of that sweep, since the cell resets one mini-sweep after firing.
    pub fn read(&self) -> Rc<Vec<T>> {
        self.batch.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_within_one_modifier_batch_together() {
        let pipe: Pipe<i32> = Pipe::new();
        trellis::modifier(|| {
            pipe.send(1).unwrap();
            pipe.send(2).unwrap();
        })
        .unwrap();
        assert_eq!(*pipe.read(), vec![1, 2]);
    }

    #[test]
    fn resets_to_empty_after_the_firing_sweep() {
        let pipe: Pipe<i32> = Pipe::new();
        trellis::modifier(|| pipe.send(1).unwrap()).unwrap();
        assert_eq!(*pipe.read(), vec![1]);
        trellis::modifier(|| {}).unwrap();
        assert_eq!(*pipe.read(), Vec::<i32>::new());
    }
}
