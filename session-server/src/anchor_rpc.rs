// session-server/src/anchor_rpc.rs
use async_trait::async_trait;
use common::models::session::{SessionConfig, SettlementRequest};
use serde::Deserialize;
use serde_json::json;
use session_engine::{AnchorError, ChainAnchor, SettlementReceipt};
use std::time::Duration;
use uuid::Uuid;

/// Chain anchor reached over the gasless network's HTTP endpoint.
/// Used once `anchor.mode = "rpc"`; development runs on the engine's
/// mock anchor instead.
pub struct RpcAnchor {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SettlementResponse {
    tx_ref: String,
    confirmed: bool,
}

impl RpcAnchor {
    pub fn new(base_url: String, request_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ChainAnchor for RpcAnchor {
    async fn open_session(
        &self,
        session_id: Uuid,
        config: &SessionConfig,
    ) -> Result<(), AnchorError> {
        let response = self
            .client
            .post(format!("{}/session/create", self.base_url))
            .json(&json!({
                "session_id": session_id,
                "chain_id": config.chain_id,
                "user_address": config.user_address,
                "contract_address": config.contract_address,
                "allowance": config.allowance,
                "duration_secs": config.duration_secs,
            }))
            .send()
            .await
            .map_err(|e| AnchorError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnchorError::Rejected(format!(
                "session handshake returned {}",
                response.status()
            )));
        }

        tracing::info!("Anchor accepted session {}", session_id);
        Ok(())
    }

    async fn submit_settlement(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, AnchorError> {
        let response = self
            .client
            .post(format!("{}/settlement/submit", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| AnchorError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnchorError::Rejected(format!(
                "settlement submission returned {}",
                response.status()
            )));
        }

        let body: SettlementResponse = response
            .json()
            .await
            .map_err(|e| AnchorError::Rpc(e.to_string()))?;

        Ok(SettlementReceipt {
            tx_ref: body.tx_ref,
            confirmed: body.confirmed,
        })
    }
}
