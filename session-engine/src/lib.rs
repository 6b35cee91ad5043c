pub mod anchor;
pub mod encoding;
pub mod error;
pub mod gas;
pub mod ledger;
pub mod log;
pub mod manager;
pub mod session;
pub mod settlement;

pub use anchor::{AnchorError, ChainAnchor, MockAnchor, SettlementReceipt};
pub use error::SessionError;
pub use ledger::AllowanceLedger;
pub use log::TransactionLog;
pub use manager::SessionManager;
pub use session::Session;
pub use settlement::SettlementEngine;
