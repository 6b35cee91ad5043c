// session-engine/src/error.rs
use thiserror::Error;

/// Typed failure classification for every session operation.
/// Callers branch on the variant, never on message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Malformed session config; not retryable without correcting input
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// Network or RPC failure while talking to the chain anchor; retryable
    #[error("chain anchor unreachable: {0}")]
    AnchorUnreachable(String),

    /// Operation requires an active session
    #[error("session is not active")]
    SessionNotActive,

    /// The session validity window has passed
    #[error("session expired")]
    SessionExpired,

    /// The intent would push cumulative spend past the allowance ceiling
    #[error("allowance exceeded: requested {requested}, remaining {remaining}")]
    AllowanceExceeded { requested: u128, remaining: u128 },

    /// Arithmetic overflow guard tripped; caller bug, not retryable
    #[error("invalid amount")]
    InvalidAmount,

    /// Settlement could not be submitted or confirmed; safe to retry close()
    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    /// The session has already settled and closed
    #[error("session already closed")]
    AlreadyClosed,

    /// Internal consistency check failure: ledger spend does not match the
    /// folded log total. Aborts the session; never swallowed.
    #[error("ledger/log divergence: ledger spent {spent}, log total {folded}")]
    LedgerLogDivergence { spent: u128, folded: u128 },
}

impl SessionError {
    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::AnchorUnreachable(_) | SessionError::SettlementFailed(_)
        )
    }
}
