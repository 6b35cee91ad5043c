// session-server/src/registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, ResponseFuture};
use chrono::{Duration as ChronoDuration, Utc};
use common::config::SessionLimitsConfig;
use common::models::session::{
    Intent, IntentReceipt, IntentRequest, SessionConfig, SessionSnapshot, SettlementResult,
};
use dashmap::DashMap;
use serde::Serialize;
use session_engine::{ChainAnchor, SessionError, SessionManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as SessionLock;
use uuid::Uuid;

/// Failures the API layer branches on
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Actor message: open a new gasless session
#[derive(Message)]
#[rtype(result = "Result<SessionSnapshot, SessionError>")]
pub struct OpenSession {
    pub config: SessionConfig,
}

/// Actor message: admit one intent into a session
#[derive(Message)]
#[rtype(result = "Result<IntentReceipt, ApiError>")]
pub struct ExecuteIntent {
    pub session_id: Uuid,
    pub request: IntentRequest,
}

/// Actor message: point-in-time session view
#[derive(Message)]
#[rtype(result = "Result<SessionSnapshot, ApiError>")]
pub struct GetSessionStatus {
    pub session_id: Uuid,
}

/// Actor message: ordered audit view of a session's intents
#[derive(Message)]
#[rtype(result = "Result<Vec<Intent>, ApiError>")]
pub struct GetSessionLog {
    pub session_id: Uuid,
}

/// Actor message: settle and close a session
#[derive(Message)]
#[rtype(result = "Result<SettlementResult, ApiError>")]
pub struct CloseSession {
    pub session_id: Uuid,
}

/// Actor message: sweep removable sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupSessions;

/// Actor message: registry metrics
#[derive(Message)]
#[rtype(result = "RegistryMetrics")]
pub struct GetRegistryMetrics;

/// Registry metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryMetrics {
    pub sessions_opened: u64,
    pub active_sessions: usize,
    pub settled_sessions: u64,
    pub failed_sessions: u64,
    pub intents_admitted: u64,
    pub total_value_settled: u128,
}

type SessionEntry = Arc<SessionLock<SessionManager>>;

/// Actor owning every live session.
///
/// Each session sits behind its own async mutex: mutating calls from
/// concurrent requests serialize per session id, which is the
/// concurrency contract the engine requires of its callers.
pub struct SessionRegistryActor {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
    anchor: Arc<dyn ChainAnchor>,
    limits: SessionLimitsConfig,
    metrics: Arc<Mutex<RegistryMetrics>>,
}

impl SessionRegistryActor {
    pub fn new(anchor: Arc<dyn ChainAnchor>, limits: SessionLimitsConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            anchor,
            limits,
            metrics: Arc::new(Mutex::new(RegistryMetrics::default())),
        }
    }

    /// Remove sessions past expiry plus the retention window. Covers
    /// settled sessions and abandoned (expired, never closed) ones
    /// alike; a session whose lock is busy is live and is skipped.
    fn cleanup_sessions(&self) -> usize {
        let now = Utc::now();
        let retention = ChronoDuration::seconds(self.limits.retention_secs as i64);

        let removable: Vec<Uuid> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let manager = entry.value().try_lock().ok()?;
                let snapshot = manager.status();
                let cutoff = snapshot.expires_at + retention;
                (now > cutoff).then_some(snapshot.session_id)
            })
            .collect();

        for session_id in &removable {
            self.sessions.remove(session_id);
            tracing::info!("Removed retired session: {}", session_id);
        }

        removable.len()
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "SessionRegistryActor started: chains {:?}, cleanup every {}s",
            self.limits.supported_chains,
            self.limits.cleanup_interval_secs
        );

        ctx.run_interval(
            Duration::from_secs(self.limits.cleanup_interval_secs),
            |act, _ctx| {
                let removed = act.cleanup_sessions();
                if removed > 0 {
                    tracing::info!("Cleaned up {} retired sessions", removed);
                }
            },
        );
    }
}

impl Handler<OpenSession> for SessionRegistryActor {
    type Result = ResponseFuture<Result<SessionSnapshot, SessionError>>;

    fn handle(&mut self, msg: OpenSession, _ctx: &mut Self::Context) -> Self::Result {
        let sessions = self.sessions.clone();
        let anchor = self.anchor.clone();
        let limits = self.limits.clone();
        let metrics = self.metrics.clone();

        Box::pin(async move {
            if !limits.supported_chains.contains(&msg.config.chain_id) {
                return Err(SessionError::InvalidConfig(format!(
                    "chain {} is not served by the gasless network",
                    msg.config.chain_id
                )));
            }
            if msg.config.duration_secs > limits.max_duration_secs {
                return Err(SessionError::InvalidConfig(format!(
                    "session duration {}s exceeds the {}s maximum",
                    msg.config.duration_secs, limits.max_duration_secs
                )));
            }

            match SessionManager::initialize(msg.config, anchor).await {
                Ok(manager) => {
                    let snapshot = manager.status();
                    sessions.insert(
                        snapshot.session_id,
                        Arc::new(SessionLock::new(manager)),
                    );
                    metrics.lock().unwrap().sessions_opened += 1;

                    tracing::info!("Opened session: {}", snapshot.session_id);
                    Ok(snapshot)
                }
                Err(e) => {
                    metrics.lock().unwrap().failed_sessions += 1;
                    tracing::warn!("Session open failed: {}", e);
                    Err(e)
                }
            }
        })
    }
}

impl Handler<ExecuteIntent> for SessionRegistryActor {
    type Result = ResponseFuture<Result<IntentReceipt, ApiError>>;

    fn handle(&mut self, msg: ExecuteIntent, _ctx: &mut Self::Context) -> Self::Result {
        let entry = self.sessions.get(&msg.session_id).map(|e| e.value().clone());
        let metrics = self.metrics.clone();

        Box::pin(async move {
            let entry = entry.ok_or(ApiError::NotFound)?;
            let mut manager = entry.lock().await;

            let receipt = manager.execute(msg.request)?;
            metrics.lock().unwrap().intents_admitted += 1;
            Ok(receipt)
        })
    }
}

impl Handler<GetSessionStatus> for SessionRegistryActor {
    type Result = ResponseFuture<Result<SessionSnapshot, ApiError>>;

    fn handle(&mut self, msg: GetSessionStatus, _ctx: &mut Self::Context) -> Self::Result {
        let entry = self.sessions.get(&msg.session_id).map(|e| e.value().clone());

        Box::pin(async move {
            let entry = entry.ok_or(ApiError::NotFound)?;
            let manager = entry.lock().await;
            Ok(manager.status())
        })
    }
}

impl Handler<GetSessionLog> for SessionRegistryActor {
    type Result = ResponseFuture<Result<Vec<Intent>, ApiError>>;

    fn handle(&mut self, msg: GetSessionLog, _ctx: &mut Self::Context) -> Self::Result {
        let entry = self.sessions.get(&msg.session_id).map(|e| e.value().clone());

        Box::pin(async move {
            let entry = entry.ok_or(ApiError::NotFound)?;
            let manager = entry.lock().await;
            Ok(manager.log().to_vec())
        })
    }
}

impl Handler<CloseSession> for SessionRegistryActor {
    type Result = ResponseFuture<Result<SettlementResult, ApiError>>;

    fn handle(&mut self, msg: CloseSession, _ctx: &mut Self::Context) -> Self::Result {
        let entry = self.sessions.get(&msg.session_id).map(|e| e.value().clone());
        let metrics = self.metrics.clone();

        Box::pin(async move {
            let entry = entry.ok_or(ApiError::NotFound)?;
            let mut manager = entry.lock().await;

            let result = manager.close().await?;

            // the session stays in the map for audit reads until cleanup
            let mut metrics = metrics.lock().unwrap();
            metrics.settled_sessions += 1;
            metrics.total_value_settled = metrics
                .total_value_settled
                .saturating_add(result.total_value);

            Ok(result)
        })
    }
}

impl Handler<CleanupSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupSessions>;

    fn handle(&mut self, _msg: CleanupSessions, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.cleanup_sessions())
    }
}

impl Handler<GetRegistryMetrics> for SessionRegistryActor {
    type Result = MessageResult<GetRegistryMetrics>;

    fn handle(&mut self, _msg: GetRegistryMetrics, _ctx: &mut Self::Context) -> Self::Result {
        let mut metrics = self.metrics.lock().unwrap().clone();
        metrics.active_sessions = self.sessions.len();
        MessageResult(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_engine::MockAnchor;

    fn limits() -> SessionLimitsConfig {
        SessionLimitsConfig {
            supported_chains: vec![1, 8453, 84532],
            max_duration_secs: 86400,
            cleanup_interval_secs: 3600,
            retention_secs: 86400,
        }
    }

    fn config(chain_id: u64) -> SessionConfig {
        SessionConfig {
            chain_id,
            user_address: "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
            contract_address: "0x000000000000000000000000000000000000dEaD".to_string(),
            allowance: 1_000,
            duration_secs: 3_600,
        }
    }

    fn request(value: u128) -> IntentRequest {
        IntentRequest {
            to: "0x000000000000000000000000000000000000dEaD".to_string(),
            payload: "0x".to_string(),
            value,
        }
    }

    #[actix_web::test]
    async fn open_execute_close_through_the_registry() {
        let registry =
            SessionRegistryActor::new(Arc::new(MockAnchor::new()), limits()).start();

        let snapshot = registry
            .send(OpenSession { config: config(8453) })
            .await
            .unwrap()
            .unwrap();
        let session_id = snapshot.session_id;

        let receipt = registry
            .send(ExecuteIntent {
                session_id,
                request: request(250),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.spent, 250);

        let result = registry
            .send(CloseSession { session_id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.total_value, 250);
        assert_eq!(result.intent_count, 1);

        let metrics = registry.send(GetRegistryMetrics).await.unwrap();
        assert_eq!(metrics.sessions_opened, 1);
        assert_eq!(metrics.settled_sessions, 1);
        assert_eq!(metrics.intents_admitted, 1);
        assert_eq!(metrics.total_value_settled, 250);
    }

    #[actix_web::test]
    async fn unsupported_chain_is_rejected_before_the_anchor() {
        let anchor = Arc::new(MockAnchor::new());
        // a refused handshake would also fail, proving the gate fires first
        anchor.refuse_handshake();
        let registry = SessionRegistryActor::new(anchor, limits()).start();

        let err = registry
            .send(OpenSession { config: config(777) })
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig(_)));
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let registry =
            SessionRegistryActor::new(Arc::new(MockAnchor::new()), limits()).start();

        let err = registry
            .send(ExecuteIntent {
                session_id: Uuid::new_v4(),
                request: request(1),
            })
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[actix_web::test]
    async fn cleanup_keeps_live_sessions() {
        let registry =
            SessionRegistryActor::new(Arc::new(MockAnchor::new()), limits()).start();

        let snapshot = registry
            .send(OpenSession { config: config(8453) })
            .await
            .unwrap()
            .unwrap();

        let removed = registry.send(CleanupSessions).await.unwrap();
        assert_eq!(removed, 0);

        let status = registry
            .send(GetSessionStatus {
                session_id: snapshot.session_id,
            })
            .await
            .unwrap();
        assert!(status.is_ok());
    }
}
