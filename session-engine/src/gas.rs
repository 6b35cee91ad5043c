// session-engine/src/gas.rs
use serde::{Deserialize, Serialize};

// Average gas cost of one settled transaction on the target chains
const AVG_GAS_PER_TRANSACTION: u128 = 150_000;

/// What batching a session's transactions into one settlement saves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSavings {
    pub total_savings: u128,
    pub savings_per_transaction: u128,
}

/// Estimate gas savings for a batch of `transaction_count` operations at
/// the given standard gas price. Returns `None` for an empty batch or
/// when the estimate overflows.
pub fn estimate_gas_savings(
    standard_gas_price: u128,
    transaction_count: u64,
) -> Option<GasSavings> {
    if transaction_count == 0 {
        return None;
    }

    let total_gas = AVG_GAS_PER_TRANSACTION.checked_mul(transaction_count as u128)?;
    let total_savings = total_gas.checked_mul(standard_gas_price)?;

    Some(GasSavings {
        total_savings,
        savings_per_transaction: total_savings / transaction_count as u128,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_scale_with_count_and_price() {
        let savings = estimate_gas_savings(10, 4).unwrap();
        assert_eq!(savings.total_savings, 150_000 * 10 * 4);
        assert_eq!(savings.savings_per_transaction, 150_000 * 10);
    }

    #[test]
    fn empty_batch_has_no_estimate() {
        assert_eq!(estimate_gas_savings(10, 0), None);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        assert_eq!(estimate_gas_savings(u128::MAX, 2), None);
    }
}
