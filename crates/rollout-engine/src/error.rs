//! Engine error types.

use rollout_store::StoreError;
use thiserror::Error;

/// Errors raised by the rollout engine itself.
///
/// A flag that does not exist is not an error: it evaluates to `false`.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// The backing store failed and no usable cache entry could stand in.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A current-format record exists but cannot be decoded.
    #[error("corrupt flag record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(u32),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type RolloutResult<T> = Result<T, RolloutError>;

/// Outcome of a failed guarded invocation.
///
/// `Engine` means the flag could not be evaluated and the block never ran.
/// `Caller` carries the block's own error, exactly as the block returned it.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    #[error(transparent)]
    Engine(RolloutError),

    #[error("guarded call failed")]
    Caller(E),
}

impl<E> GuardError<E> {
    /// The caller's error, if this failure came from inside the block.
    pub fn into_caller(self) -> Option<E> {
        match self {
            Self::Caller(e) => Some(e),
            Self::Engine(_) => None,
        }
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
