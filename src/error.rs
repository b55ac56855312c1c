// ============================================================================
// ERROR TYPES
// ============================================================================
//
// Two classes of failure, kept deliberately separate:
//
// - Domain outcomes (wrong state, conflict, capacity, not found) are result
//   codes in RPC responses or typed `StoreError` variants the engine maps to
//   result codes. Clients branch on them without exception handling.
// - Infrastructure faults (store unavailable, ledger oracle failure) are
//   surfaced as errors, logged with context, and never retried here; retry
//   policy belongs to the caller.

use thiserror::Error;

/// Persistence-boundary errors. The named variants are expected business
/// states; `Unavailable` is an infrastructure fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("pool not found")]
    PoolNotFound,
    #[error("pool id already exists")]
    PoolIdExists,
    #[error("pool funding destination already exists")]
    FundingDestinationExists,
    #[error("pool is open")]
    PoolOpen,
    #[error("pool is already resolved")]
    PoolResolved,
    #[error("bet not found")]
    BetNotFound,
    #[error("bet already exists")]
    BetExists,
    #[error("max bet count exceeded")]
    MaxBetCountExceeded,
    #[error("pool member not found")]
    MemberNotFound,
    #[error("resolution cannot be unknown")]
    InvalidResolution,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// External ledger oracle failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Caller authentication/authorization failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("authorization unavailable: {0}")]
    Unavailable(String),
}

/// Bet payment oracle failures (is-paid checks and summary computation)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("unsupported resolution")]
    UnsupportedResolution,
}

/// Transport-level engine failures. Domain outcomes never appear here; they
/// are result codes in the operation responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Caller authentication, registration, or record signature failure.
    /// Terminal; never retried.
    #[error("permission denied")]
    PermissionDenied,
    /// Malformed input rejected before any state is touched
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Infrastructure fault, logged with full context at the raise site
    #[error("internal: {0}")]
    Internal(String),
}

impl From<AuthError> for EngineError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::PermissionDenied => EngineError::PermissionDenied,
            AuthError::Unavailable(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<PaymentError> for EngineError {
    fn from(err: PaymentError) -> Self {
        EngineError::Internal(err.to_string())
    }
}
