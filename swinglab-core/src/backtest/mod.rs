//! Trade simulation: the single-position state machine and the ledger it
//! produces.

pub mod ledger;
pub mod simulator;

pub use ledger::{EquityPoint, TradeLedger};
pub use simulator::TradeSimulator;
