// session-engine/src/manager.rs
use crate::anchor::ChainAnchor;
use crate::error::SessionError;
use crate::session::Session;
use crate::settlement::SettlementEngine;
use chrono::Utc;
use common::models::session::{
    Intent, IntentReceipt, IntentRequest, SessionConfig, SessionSnapshot, SessionState,
    SettlementResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

// Upper bound on anchor calls; the session's remaining duration wins
// when it is shorter
const ANCHOR_CALL_TIMEOUT_SECS: u64 = 30;

/// Owns one session plus the anchor handle and exposes the public
/// contract: initialize, execute, status, close.
///
/// One logical owner per session: mutating calls take `&mut self`, so a
/// manager shared between tasks must sit behind a mutex. Reads through
/// `status` and `log` can never observe a half-applied intent.
pub struct SessionManager {
    session: Session,
    anchor: Arc<dyn ChainAnchor>,
    updates: watch::Sender<SessionSnapshot>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session)
            .field("anchor", &"<dyn ChainAnchor>")
            .field("updates", &self.updates)
            .finish()
    }
}

impl SessionManager {
    /// Validate the config, perform the anchor handshake, and return a
    /// manager holding an active session. A rejected or timed-out
    /// handshake fails the session terminally; callers construct a new
    /// one rather than retrying this instance.
    pub async fn initialize(
        config: SessionConfig,
        anchor: Arc<dyn ChainAnchor>,
    ) -> Result<Self, SessionError> {
        let now = Utc::now();
        let mut session = Session::new(config, now)?;

        let timeout = Duration::from_secs(
            session
                .config()
                .duration_secs
                .min(ANCHOR_CALL_TIMEOUT_SECS),
        );
        let handshake = tokio::time::timeout(
            timeout,
            anchor.open_session(session.session_id(), session.config()),
        )
        .await;

        match handshake {
            Err(_) => {
                session.fail();
                tracing::warn!(
                    "Anchor handshake timed out for session {}",
                    session.session_id()
                );
                Err(SessionError::AnchorUnreachable(
                    "handshake timed out".to_string(),
                ))
            }
            Ok(Err(e)) => {
                session.fail();
                tracing::warn!(
                    "Anchor handshake failed for session {}: {}",
                    session.session_id(),
                    e
                );
                Err(SessionError::AnchorUnreachable(e.to_string()))
            }
            Ok(Ok(())) => {
                session.activate();
                tracing::info!(
                    "Session {} active: allowance {}, expires {}",
                    session.session_id(),
                    session.ledger().allowance(),
                    session.expires_at()
                );

                let (updates, _) = watch::channel(session.snapshot(now));
                Ok(Self {
                    session,
                    anchor,
                    updates,
                })
            }
        }
    }

    /// Rebuild a manager from a durable session record
    pub fn restore(session: Session, anchor: Arc<dyn ChainAnchor>) -> Self {
        let (updates, _) = watch::channel(session.snapshot(Utc::now()));
        Self {
            session,
            anchor,
            updates,
        }
    }

    /// Surrender the session as its durable record
    pub fn into_record(self) -> Session {
        self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.session_id()
    }

    /// Admit one off-chain intent. Purely in-memory, never suspends.
    pub fn execute(&mut self, request: IntentRequest) -> Result<IntentReceipt, SessionError> {
        let now = Utc::now();
        let receipt = self.session.admit(request, now)?;

        tracing::debug!(
            "Session {} admitted intent #{} for {} ({} remaining)",
            receipt.session_id,
            receipt.sequence,
            receipt.value,
            receipt.remaining
        );
        self.publish();
        Ok(receipt)
    }

    /// Point-in-time view of the session; never fails
    pub fn status(&self) -> SessionSnapshot {
        self.session.snapshot(Utc::now())
    }

    /// Ordered audit view of every admitted intent; remains readable
    /// after the session closes
    pub fn log(&self) -> &[Intent] {
        self.session.log().all()
    }

    /// Settlement result once the session has closed
    pub fn settlement(&self) -> Option<&SettlementResult> {
        self.session.settlement()
    }

    /// Push-style observation: a snapshot receiver updated after every
    /// state change. Dropping the receiver is the unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Fold the log into one settlement and submit it to the anchor.
    /// A failed submission leaves ledger, log, and state untouched, so
    /// calling close again retries the identical settlement.
    pub async fn close(&mut self) -> Result<SettlementResult, SessionError> {
        match self.session.state() {
            SessionState::Closed => return Err(SessionError::AlreadyClosed),
            SessionState::Active => {}
            // Expired and Settling are never stored; anything else cannot settle
            _ => return Err(SessionError::SessionNotActive),
        }

        let request = match SettlementEngine::fold(&self.session) {
            Ok(request) => request,
            Err(e) => {
                // correctness bug, not a runtime condition: abort loudly
                tracing::error!("Session {} aborted: {}", self.session.session_id(), e);
                self.session.fail();
                self.publish();
                return Err(e);
            }
        };

        self.session.begin_settling();
        self.publish();

        let timeout = self.settlement_timeout();
        match SettlementEngine::submit(self.anchor.as_ref(), &request, timeout).await {
            Err(e) => {
                self.session.abort_settling();
                self.publish();
                tracing::warn!(
                    "Settlement attempt failed for session {}: {}",
                    request.session_id,
                    e
                );
                Err(e)
            }
            Ok(receipt) => {
                let result = SettlementResult {
                    session_id: request.session_id,
                    tx_ref: receipt.tx_ref,
                    total_value: request.total_value,
                    intent_count: request.intent_count,
                    settled_at: Utc::now(),
                };
                self.session.mark_settled(result.clone());
                self.publish();

                tracing::info!(
                    "Session {} settled: {} over {} intents, tx {}",
                    result.session_id,
                    result.total_value,
                    result.intent_count,
                    result.tx_ref
                );
                Ok(result)
            }
        }
    }

    fn settlement_timeout(&self) -> Duration {
        let remaining = (self.session.expires_at() - Utc::now()).num_seconds();
        let secs = if remaining > 0 {
            (remaining as u64).min(ANCHOR_CALL_TIMEOUT_SECS)
        } else {
            // expired sessions still settle; give them the full bound
            ANCHOR_CALL_TIMEOUT_SECS
        };
        Duration::from_secs(secs)
    }

    fn publish(&self) {
        self.updates.send_replace(self.session.snapshot(Utc::now()));
    }
}
