// session-engine/src/ledger.rs
use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Pure spend accounting against a fixed ceiling for one session.
/// Invariant: `0 <= spent <= allowance` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceLedger {
    allowance: u128,
    spent: u128,
}

impl AllowanceLedger {
    pub fn new(allowance: u128) -> Self {
        Self {
            allowance,
            spent: 0,
        }
    }

    pub fn allowance(&self) -> u128 {
        self.allowance
    }

    pub fn spent(&self) -> u128 {
        self.spent
    }

    pub fn remaining(&self) -> u128 {
        self.allowance - self.spent
    }

    /// Whether `amount` fits under the ceiling. Pure, no side effect.
    /// An amount that would overflow the spend counter never fits.
    pub fn can_spend(&self, amount: u128) -> bool {
        match self.spent.checked_add(amount) {
            Some(total) => total <= self.allowance,
            None => false,
        }
    }

    /// Record a spend. The sole mutator of `spent`.
    /// Zero amounts succeed and leave the ledger untouched.
    pub fn record(&mut self, amount: u128) -> Result<(), SessionError> {
        let total = self
            .spent
            .checked_add(amount)
            .ok_or(SessionError::InvalidAmount)?;

        if total > self.allowance {
            return Err(SessionError::AllowanceExceeded {
                requested: amount,
                remaining: self.remaining(),
            });
        }

        self.spent = total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_spend_up_to_the_ceiling() {
        let mut ledger = AllowanceLedger::new(1_000);
        assert!(ledger.can_spend(300));
        ledger.record(300).unwrap();
        assert_eq!(ledger.spent(), 300);
        assert_eq!(ledger.remaining(), 700);

        // exactly exhausting the allowance is allowed
        ledger.record(700).unwrap();
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn rejects_spend_past_the_ceiling() {
        let mut ledger = AllowanceLedger::new(1_000);
        ledger.record(300).unwrap();

        let err = ledger.record(800).unwrap_err();
        assert_eq!(
            err,
            SessionError::AllowanceExceeded {
                requested: 800,
                remaining: 700
            }
        );
        // rejected spends leave the ledger untouched
        assert_eq!(ledger.spent(), 300);
    }

    #[test]
    fn zero_spend_is_a_no_op() {
        let mut ledger = AllowanceLedger::new(0);
        assert!(ledger.can_spend(0));
        ledger.record(0).unwrap();
        assert_eq!(ledger.spent(), 0);
        assert!(!ledger.can_spend(1));
    }

    #[test]
    fn overflow_is_invalid_amount_not_a_wrap() {
        let mut ledger = AllowanceLedger::new(u128::MAX);
        ledger.record(u128::MAX).unwrap();

        assert!(!ledger.can_spend(1));
        assert_eq!(ledger.record(1).unwrap_err(), SessionError::InvalidAmount);
        assert_eq!(ledger.spent(), u128::MAX);
    }
}
