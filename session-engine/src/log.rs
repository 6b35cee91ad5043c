// session-engine/src/log.rs
use chrono::{DateTime, Utc};
use common::models::session::Intent;
use serde::{Deserialize, Serialize};

/// Append-only, strictly ordered record of admitted intents.
/// The sole source of truth for settlement folding: nothing is ever
/// removed or reordered, so settlement is reproducible from the log alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionLog {
    entries: Vec<Intent>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an intent, assigning the next sequence number.
    /// Sequence numbers start at 1 and are derived from the log length,
    /// so duplicates cannot be constructed here.
    pub fn append(
        &mut self,
        to: String,
        payload: String,
        value: u128,
        admitted_at: DateTime<Utc>,
    ) -> &Intent {
        let sequence = self.entries.len() as u64 + 1;
        debug_assert!(
            self.entries.last().map_or(true, |prev| prev.sequence < sequence),
            "sequence numbers must be strictly increasing"
        );

        self.entries.push(Intent {
            sequence,
            to,
            payload,
            value,
            admitted_at,
        });

        // just pushed, cannot be empty
        self.entries.last().unwrap()
    }

    /// Read-only ordered view of every admitted intent
    pub fn all(&self) -> &[Intent] {
        &self.entries
    }

    pub fn count(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
