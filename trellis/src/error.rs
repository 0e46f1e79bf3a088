//! Re-exports of the substrate's error types, plus the ones the typed layer
//! adds.

pub use trellis_runtime::{ConflictError, InvalidOperation, ReadOnlyError, TrellisError, UserError};
