//! Error kinds raised by the substrate.

use thiserror::Error;

use crate::symbol::Symbol;

/// Mutually inconsistent writes in one sweep, or a cycle that failed to
/// converge within the configured iteration budget.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Two writes to the same cell in one atomic section disagreed.
    #[error("conflicting writes to cell {symbol:?}: {old} vs {new}")]
    Values {
        symbol: Symbol,
        old: String,
        new: String,
    },
    /// A value cycle failed to reach a fixed point within the budget.
    #[error("cycle through cell {symbol:?} did not converge within the iteration budget")]
    Diverged { symbol: Symbol },
}

/// A write to a cell that cannot presently accept one.
#[derive(Debug, Error)]
#[error("cell {symbol:?} is read-only: {reason}")]
pub struct ReadOnlyError {
    pub symbol: Symbol,
    pub reason: &'static str,
}

/// An API was used outside of the context it requires.
#[derive(Debug, Error)]
pub enum InvalidOperation {
    #[error("`{0}` may only be called from within a running rule")]
    NotInRule(&'static str),
    #[error("`{0}` may only be called outside of a running rule")]
    OnlyOutsideRule(&'static str),
    #[error("can't read and write in the same operation: {0}")]
    ReadWriteSameOperation(&'static str),
    #[error(".future may only be read from within a modifier")]
    FutureOutsideModifier,
    #[error("scope managers can only be registered inside an atomic section")]
    ManageOutsideSection,
    #[error("the event loop isn't running")]
    LoopNotRunning,
}

/// An exception that escaped a user-supplied rule body.
#[derive(Debug, Error)]
#[error("rule raised an error: {message}")]
pub struct UserError {
    pub message: String,
}

/// The unified error type returned by [`crate::engine::Engine::atomically`].
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    ReadOnly(#[from] ReadOnlyError),
    #[error(transparent)]
    Invalid(#[from] InvalidOperation),
    #[error(transparent)]
    User(#[from] UserError),
}

impl TrellisError {
    /// Converts a caught unwind payload into a [`TrellisError`], preserving a
    /// [`TrellisError`] payload raised internally (e.g. for a write conflict)
    /// and otherwise treating the panic as a [`UserError`] escaping a rule.
    pub fn from_panic_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        match payload.downcast::<TrellisError>() {
            Ok(err) => *err,
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "rule panicked with a non-string payload".to_string()
                };
                TrellisError::User(UserError { message })
            }
        }
    }
}
