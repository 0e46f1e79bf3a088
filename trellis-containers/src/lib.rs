//! Observable collections built on [`trellis::Cell`].
//!
//! Each container keeps its settled state in an ordinary cell and queues
//! mutations onto a pending log that lands as one batch when the enclosing
//! modifier commits, so a rule that performs several mutations in a row
//! triggers its listeners once, not once per mutation. Each container also
//! exposes discrete signal cells (`added`, `changed`, `removed`) that fire
//! with the keys or values touched during the sweep that just committed,
//! for rules that want to react to the delta rather than re-scan the whole
//! collection.

pub mod map;
pub mod pipe;
pub mod seq;
pub mod set;

pub use map::{MapKey, MapValue, MutMap};
pub use pipe::{Pipe, PipeElem};
pub use seq::{MutSeq, SeqElem};
pub use set::{MutSet, SetElem};
