// session-engine/src/settlement.rs
use crate::anchor::{ChainAnchor, SettlementReceipt};
use crate::error::SessionError;
use crate::session::Session;
use common::models::session::SettlementRequest;
use std::time::Duration;

/// Folds a session's intent log into exactly one on-chain operation.
///
/// Folding only reads the log; nothing is consumed until the anchor
/// confirms, so a failed submission leaves the session retryable with
/// the identical request.
pub struct SettlementEngine;

impl SettlementEngine {
    /// Collapse the log into a settlement request, checking the internal
    /// consistency invariant: the folded total must equal the ledger's
    /// recorded spend. A mismatch is a bug in this crate, not a runtime
    /// condition, and aborts the session.
    pub fn fold(session: &Session) -> Result<SettlementRequest, SessionError> {
        let spent = session.ledger().spent();

        let mut folded: u128 = 0;
        for intent in session.log().all() {
            folded = match folded.checked_add(intent.value) {
                Some(total) => total,
                // the sum wrapped, so it cannot equal any valid ledger value
                None => {
                    return Err(SessionError::LedgerLogDivergence {
                        spent,
                        folded: u128::MAX,
                    })
                }
            };
        }

        if folded != spent {
            return Err(SessionError::LedgerLogDivergence { spent, folded });
        }

        Ok(SettlementRequest {
            session_id: session.session_id(),
            total_value: folded,
            intent_count: session.log().count(),
        })
    }

    /// Submit one settlement request to the anchor under a timeout.
    /// Every failure maps to `SettlementFailed` so the caller can retry.
    pub async fn submit(
        anchor: &dyn ChainAnchor,
        request: &SettlementRequest,
        timeout: Duration,
    ) -> Result<SettlementReceipt, SessionError> {
        let outcome = tokio::time::timeout(timeout, anchor.submit_settlement(request)).await;

        match outcome {
            Err(_) => Err(SessionError::SettlementFailed(format!(
                "settlement submission timed out after {}s",
                timeout.as_secs()
            ))),
            Ok(Err(e)) => Err(SessionError::SettlementFailed(e.to_string())),
            Ok(Ok(receipt)) if !receipt.confirmed => Err(SessionError::SettlementFailed(
                "anchor did not confirm the settlement".to_string(),
            )),
            Ok(Ok(receipt)) => Ok(receipt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::models::session::{IntentRequest, SessionConfig};

    fn active_session(allowance: u128) -> Session {
        let config = SessionConfig {
            chain_id: 8453,
            user_address: "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string(),
            contract_address: "0x000000000000000000000000000000000000dEaD".to_string(),
            allowance,
            duration_secs: 3_600,
        };
        let mut session = Session::new(config, Utc::now()).unwrap();
        session.activate();
        session
    }

    #[test]
    fn fold_matches_ledger_and_preserves_count() {
        let mut session = active_session(1_000);
        let now = Utc::now();
        for value in [100u128, 0, 200] {
            session
                .admit(
                    IntentRequest {
                        to: "0x000000000000000000000000000000000000dEaD".to_string(),
                        payload: "0x".to_string(),
                        value,
                    },
                    now,
                )
                .unwrap();
        }

        let request = SettlementEngine::fold(&session).unwrap();
        assert_eq!(request.total_value, 300);
        assert_eq!(request.intent_count, 3);
        assert_eq!(request.session_id, session.session_id());
    }

    #[test]
    fn fold_of_empty_session_is_zero() {
        let session = active_session(500);
        let request = SettlementEngine::fold(&session).unwrap();
        assert_eq!(request.total_value, 0);
        assert_eq!(request.intent_count, 0);
    }
}
