// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable parameters a gasless session is opened with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chain the session settles on
    pub chain_id: u64,
    /// Wallet address of the session owner
    pub user_address: String,
    /// Contract the settlement is anchored against
    pub contract_address: String,
    /// Maximum cumulative value the session may authorize, in the
    /// smallest token unit
    pub allowance: u128,
    /// Session validity window in seconds
    pub duration_secs: u64,
}

impl SessionConfig {
    /// Check the config is well formed before a session is built from it.
    /// Allowance of zero is allowed (pure-call sessions).
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_secs == 0 {
            return Err("session duration must be greater than zero".to_string());
        }
        if !is_well_formed_address(&self.user_address) {
            return Err(format!("malformed user address: {}", self.user_address));
        }
        if !is_well_formed_address(&self.contract_address) {
            return Err(format!(
                "malformed contract address: {}",
                self.contract_address
            ));
        }
        Ok(())
    }
}

/// 0x-prefixed, 20-byte hex address
pub fn is_well_formed_address(addr: &str) -> bool {
    let Some(body) = addr.strip_prefix("0x") else {
        return false;
    };
    body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Lifecycle state of a gasless session.
/// `Expired` is derived from the clock on access, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Active,
    Expired,
    Settling,
    Closed,
    Failed,
}

impl SessionState {
    /// Terminal states accept no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// One admitted off-chain operation, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Monotonic admission order, starting at 1
    pub sequence: u64,
    /// Target address of the call
    pub to: String,
    /// Opaque hex-encoded instruction payload
    pub payload: String,
    /// Value moved by this intent; zero for pure calls
    pub value: u128,
    /// Timestamp the intent was admitted
    pub admitted_at: DateTime<Utc>,
}

/// Caller-supplied request for one off-chain operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    pub to: String,
    pub payload: String,
    #[serde(default)]
    pub value: u128,
}

/// Returned to the caller after an intent is admitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentReceipt {
    pub session_id: Uuid,
    pub sequence: u64,
    pub value: u128,
    pub spent: u128,
    pub remaining: u128,
    pub admitted_at: DateTime<Utc>,
}

/// Point-in-time view of a session, safe to request at any time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub allowance: u128,
    pub spent: u128,
    pub remaining: u128,
    pub transaction_count: u64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry, clamped to zero once past
    pub time_remaining_secs: i64,
}

/// The single on-chain operation a session collapses into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub session_id: Uuid,
    pub total_value: u128,
    pub intent_count: u64,
}

/// Outcome of a confirmed settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub session_id: Uuid,
    /// On-chain transaction reference
    pub tx_ref: String,
    pub total_value: u128,
    pub intent_count: u64,
    pub settled_at: DateTime<Utc>,
}

/// Response structure for session API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub spent: u128,
    pub remaining: u128,
    pub transaction_count: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<&SessionSnapshot> for SessionResponse {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            state: snapshot.state,
            spent: snapshot.spent,
            remaining: snapshot.remaining,
            transaction_count: snapshot.transaction_count,
            expires_at: snapshot.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            chain_id: 8453,
            user_address: "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
            contract_address: "0x000000000000000000000000000000000000dEaD".to_string(),
            allowance: 1_000,
            duration_secs: 3_600,
        }
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_duration() {
        let mut cfg = config();
        cfg.duration_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_addresses() {
        let mut cfg = config();
        cfg.user_address = "71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.contract_address = "0x1234".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_allowance_is_valid() {
        let mut cfg = config();
        cfg.allowance = 0;
        assert!(cfg.validate().is_ok());
    }
}
