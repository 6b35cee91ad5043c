// session-engine/src/anchor.rs
use async_trait::async_trait;
use common::models::session::{SessionConfig, SettlementRequest};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the chain anchor collaborator
#[derive(Debug, Clone, Error)]
pub enum AnchorError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("anchor rejected the request: {0}")]
    Rejected(String),
}

/// Confirmation returned by the anchor for one settlement submission
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub tx_ref: String,
    pub confirmed: bool,
}

/// The external on-chain contract a session settles against.
///
/// Submissions must be safe to retry: the engine reuses the same
/// `session_id` on every retry so the anchor can deduplicate.
#[async_trait]
pub trait ChainAnchor: Send + Sync {
    /// Handshake performed while a session is initialized
    async fn open_session(
        &self,
        session_id: Uuid,
        config: &SessionConfig,
    ) -> Result<(), AnchorError>;

    /// Submit the single settlement transaction for a session
    async fn submit_settlement(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, AnchorError>;
}

#[derive(Default)]
struct MockAnchorState {
    refuse_handshake: bool,
    submission_failures: u32,
    confirmed: HashMap<Uuid, SettlementReceipt>,
    submissions: u64,
}

/// In-process anchor standing in for the gasless network until its
/// endpoint is live. Also the test double: handshake refusal and
/// N-failures-then-success submission are scriptable, and confirmed
/// settlements are deduplicated by session id like a real anchor would.
#[derive(Default)]
pub struct MockAnchor {
    state: Mutex<MockAnchorState>,
}

impl MockAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following handshake fail
    pub fn refuse_handshake(&self) {
        self.state.lock().unwrap().refuse_handshake = true;
    }

    /// Make the next `count` settlement submissions fail with an RPC error
    pub fn fail_submissions(&self, count: u32) {
        self.state.lock().unwrap().submission_failures = count;
    }

    /// Total settlement submissions seen, including failed ones
    pub fn submission_count(&self) -> u64 {
        self.state.lock().unwrap().submissions
    }

    fn random_tx_ref() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }
}

#[async_trait]
impl ChainAnchor for MockAnchor {
    async fn open_session(
        &self,
        session_id: Uuid,
        config: &SessionConfig,
    ) -> Result<(), AnchorError> {
        if self.state.lock().unwrap().refuse_handshake {
            return Err(AnchorError::Rejected("handshake refused".to_string()));
        }

        tracing::info!(
            "Anchor handshake complete for session {} on chain {}",
            session_id,
            config.chain_id
        );
        Ok(())
    }

    async fn submit_settlement(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, AnchorError> {
        let mut state = self.state.lock().unwrap();
        state.submissions += 1;

        // duplicate submission of a settled session returns the original
        // receipt instead of settling twice
        if let Some(receipt) = state.confirmed.get(&request.session_id) {
            tracing::debug!(
                "Duplicate settlement submission for session {}, returning existing receipt",
                request.session_id
            );
            return Ok(receipt.clone());
        }

        if state.submission_failures > 0 {
            state.submission_failures -= 1;
            return Err(AnchorError::Rpc("simulated rpc failure".to_string()));
        }

        let receipt = SettlementReceipt {
            tx_ref: Self::random_tx_ref(),
            confirmed: true,
        };
        state.confirmed.insert(request.session_id, receipt.clone());

        tracing::info!(
            "Settlement confirmed for session {}: {} over {} intents",
            request.session_id,
            request.total_value,
            request.intent_count
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session_id: Uuid) -> SettlementRequest {
        SettlementRequest {
            session_id,
            total_value: 500,
            intent_count: 3,
        }
    }

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let anchor = MockAnchor::new();
        anchor.fail_submissions(2);
        let id = Uuid::new_v4();

        assert!(anchor.submit_settlement(&request(id)).await.is_err());
        assert!(anchor.submit_settlement(&request(id)).await.is_err());
        let receipt = anchor.submit_settlement(&request(id)).await.unwrap();
        assert!(receipt.confirmed);
        assert_eq!(anchor.submission_count(), 3);
    }

    #[tokio::test]
    async fn duplicate_submission_returns_same_receipt() {
        let anchor = MockAnchor::new();
        let id = Uuid::new_v4();

        let first = anchor.submit_settlement(&request(id)).await.unwrap();
        let second = anchor.submit_settlement(&request(id)).await.unwrap();
        assert_eq!(first.tx_ref, second.tx_ref);
    }

    #[tokio::test]
    async fn refused_handshake_is_an_error() {
        let anchor = MockAnchor::new();
        anchor.refuse_handshake();

        let config = SessionConfig {
            chain_id: 1,
            user_address: "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
            contract_address: "0x000000000000000000000000000000000000dEaD".to_string(),
            allowance: 100,
            duration_secs: 60,
        };
        assert!(anchor.open_session(Uuid::new_v4(), &config).await.is_err());
    }
}
