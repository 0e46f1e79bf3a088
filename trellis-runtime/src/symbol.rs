//! Stable identities for cells, as seen by the scheduler.
//!
//! The runtime never looks inside a cell's value; it only ever deals in
//! [`Symbol`]s, never the value behind one.

use std::fmt;

/// A process-unique (per [`crate::Engine`]) identity for a cell.
///
/// Symbols are never reused, even after the cell they named is purged.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u64);

impl Symbol {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Symbol(raw)
    }

    /// The raw numeric id, mostly useful for logging and error messages.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
