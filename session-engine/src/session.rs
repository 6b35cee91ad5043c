// session-engine/src/session.rs
use crate::error::SessionError;
use crate::ledger::AllowanceLedger;
use crate::log::TransactionLog;
use chrono::{DateTime, Duration, Utc};
use common::models::session::{
    IntentReceipt, IntentRequest, SessionConfig, SessionSnapshot, SessionState, SettlementResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One time-bounded, allowance-capped off-chain session.
///
/// The struct is the durable record: serializing it whole captures
/// everything needed to recover the session across a process restart
/// (id, config, ledger, log, state, window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    session_id: Uuid,
    config: SessionConfig,
    state: SessionState,
    ledger: AllowanceLedger,
    log: TransactionLog,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    settlement: Option<SettlementResult>,
}

impl Session {
    /// Build a session in the `Uninitialized` state. It only becomes
    /// usable once the anchor handshake succeeds and `activate` runs.
    pub fn new(config: SessionConfig, now: DateTime<Utc>) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;

        let duration = i64::try_from(config.duration_secs)
            .map_err(|_| SessionError::InvalidConfig("session duration too large".to_string()))?;
        let expires_at = now
            .checked_add_signed(Duration::seconds(duration))
            .ok_or_else(|| SessionError::InvalidConfig("session expiry overflows".to_string()))?;

        Ok(Self {
            session_id: Uuid::new_v4(),
            ledger: AllowanceLedger::new(config.allowance),
            log: TransactionLog::new(),
            config,
            state: SessionState::Uninitialized,
            started_at: now,
            expires_at,
            settlement: None,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &AllowanceLedger {
        &self.ledger
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn settlement(&self) -> Option<&SettlementResult> {
        self.settlement.as_ref()
    }

    /// The validity window is inclusive of its last instant: a session is
    /// expired strictly after `expires_at`, never at it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Stored state with expiry folded in. `Expired` is computed here on
    /// every access, never written back.
    pub fn effective_state(&self, now: DateTime<Utc>) -> SessionState {
        if self.state == SessionState::Active && self.is_expired_at(now) {
            SessionState::Expired
        } else {
            self.state
        }
    }

    /// Anchor handshake succeeded; the session starts accepting intents
    pub(crate) fn activate(&mut self) {
        debug_assert_eq!(self.state, SessionState::Uninitialized);
        self.state = SessionState::Active;
    }

    /// Terminal abort: handshake rejection or internal divergence
    pub(crate) fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    pub(crate) fn begin_settling(&mut self) {
        debug_assert_eq!(self.state, SessionState::Active);
        self.state = SessionState::Settling;
    }

    /// Settlement submission failed; the session stays retryable
    pub(crate) fn abort_settling(&mut self) {
        debug_assert_eq!(self.state, SessionState::Settling);
        self.state = SessionState::Active;
    }

    /// Settlement confirmed; the session is closed for good
    pub(crate) fn mark_settled(&mut self, result: SettlementResult) {
        debug_assert_eq!(self.state, SessionState::Settling);
        self.settlement = Some(result);
        self.state = SessionState::Closed;
    }

    /// Admit one intent: state gate, expiry gate, ledger check, then
    /// ledger mutation and log append as one atomic step. A rejection on
    /// any gate leaves ledger and log exactly as they were.
    pub fn admit(
        &mut self,
        request: IntentRequest,
        now: DateTime<Utc>,
    ) -> Result<IntentReceipt, SessionError> {
        match self.state {
            SessionState::Active => {}
            _ => return Err(SessionError::SessionNotActive),
        }
        if self.is_expired_at(now) {
            return Err(SessionError::SessionExpired);
        }

        // record() is the only fallible sub-step; append() cannot fail,
        // so a ledger rejection means nothing was applied
        self.ledger.record(request.value)?;
        let intent = self
            .log
            .append(request.to, request.payload, request.value, now);

        Ok(IntentReceipt {
            session_id: self.session_id,
            sequence: intent.sequence,
            value: intent.value,
            spent: self.ledger.spent(),
            remaining: self.ledger.remaining(),
            admitted_at: intent.admitted_at,
        })
    }

    /// Point-in-time view; always safe to call, reflects derived expiry
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let time_remaining = (self.expires_at - now).num_seconds().max(0);

        SessionSnapshot {
            session_id: self.session_id,
            state: self.effective_state(now),
            allowance: self.ledger.allowance(),
            spent: self.ledger.spent(),
            remaining: self.ledger.remaining(),
            transaction_count: self.log.count(),
            started_at: self.started_at,
            expires_at: self.expires_at,
            time_remaining_secs: time_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allowance: u128, duration_secs: u64) -> SessionConfig {
        SessionConfig {
            chain_id: 8453,
            user_address: "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
            contract_address: "0x000000000000000000000000000000000000dEaD".to_string(),
            allowance,
            duration_secs,
        }
    }

    fn request(value: u128) -> IntentRequest {
        IntentRequest {
            to: "0x000000000000000000000000000000000000dEaD".to_string(),
            payload: "0x".to_string(),
            value,
        }
    }

    fn active_session(allowance: u128, duration_secs: u64, now: DateTime<Utc>) -> Session {
        let mut session = Session::new(config(allowance, duration_secs), now).unwrap();
        session.activate();
        session
    }

    #[test]
    fn uninitialized_session_rejects_intents() {
        let now = Utc::now();
        let mut session = Session::new(config(1_000, 3_600), now).unwrap();
        assert_eq!(
            session.admit(request(10), now).unwrap_err(),
            SessionError::SessionNotActive
        );
    }

    #[test]
    fn admits_within_window_and_allowance() {
        let now = Utc::now();
        let mut session = active_session(1_000, 3_600, now);

        let receipt = session.admit(request(300), now).unwrap();
        assert_eq!(receipt.sequence, 1);
        assert_eq!(receipt.spent, 300);
        assert_eq!(receipt.remaining, 700);

        let snapshot = session.snapshot(now);
        assert_eq!(snapshot.state, SessionState::Active);
        assert_eq!(snapshot.transaction_count, 1);
    }

    #[test]
    fn rejected_intent_leaves_ledger_and_log_untouched() {
        let now = Utc::now();
        let mut session = active_session(1_000, 3_600, now);
        session.admit(request(300), now).unwrap();

        let err = session.admit(request(800), now).unwrap_err();
        assert_eq!(
            err,
            SessionError::AllowanceExceeded {
                requested: 800,
                remaining: 700
            }
        );
        assert_eq!(session.ledger().spent(), 300);
        assert_eq!(session.log().count(), 1);
    }

    #[test]
    fn zero_value_intent_is_logged_without_spend() {
        let now = Utc::now();
        let mut session = active_session(1_000, 3_600, now);

        let receipt = session.admit(request(0), now).unwrap();
        assert_eq!(receipt.value, 0);
        assert_eq!(session.ledger().spent(), 0);
        assert_eq!(session.log().count(), 1);
    }

    #[test]
    fn accepted_exactly_at_expiry_rejected_one_tick_after() {
        let now = Utc::now();
        let mut session = active_session(1_000, 10, now);
        let at_expiry = now + Duration::seconds(10);
        let after_expiry = at_expiry + Duration::seconds(1);

        // now == expires_at is still inside the window
        session.admit(request(5), at_expiry).unwrap();

        assert_eq!(
            session.admit(request(5), after_expiry).unwrap_err(),
            SessionError::SessionExpired
        );
        assert_eq!(session.effective_state(after_expiry), SessionState::Expired);
    }

    #[test]
    fn snapshot_reflects_derived_expiry_and_clamps_time_remaining() {
        let now = Utc::now();
        let session = active_session(500, 10, now);
        let later = now + Duration::seconds(60);

        let snapshot = session.snapshot(later);
        assert_eq!(snapshot.state, SessionState::Expired);
        assert_eq!(snapshot.time_remaining_secs, 0);
        // stored state is untouched; expiry is never written back
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn spent_always_equals_sum_of_logged_values() {
        let now = Utc::now();
        let mut session = active_session(1_000, 3_600, now);

        for value in [100u128, 0, 250, 50] {
            session.admit(request(value), now).unwrap();
            let folded: u128 = session.log().all().iter().map(|i| i.value).sum();
            assert_eq!(session.ledger().spent(), folded);
        }
    }

    #[test]
    fn durable_record_round_trips_through_serde() {
        let now = Utc::now();
        let mut session = active_session(1_000, 3_600, now);
        session.admit(request(123), now).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.session_id(), session.session_id());
        assert_eq!(restored.state(), SessionState::Active);
        assert_eq!(restored.ledger().spent(), 123);
        assert_eq!(restored.log().count(), 1);
        assert_eq!(restored.expires_at(), session.expires_at());
    }
}
