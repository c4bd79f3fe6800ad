//! Mini-AMM Library
//!
//! A two-token constant-product pool ledger with a fee bucket, LP shares and
//! an operator role, plus the keeper that compounds fees and rebalances the
//! pool either in-process or against a deployed contract.

pub mod config;
pub mod contracts;
pub mod keeper;
pub mod pool;
pub mod types;

// Re-export commonly used types
pub use config::KeeperConfig;
pub use keeper::{KeeperScheduler, KeeperStatus, LocalGateway, PoolGateway};
pub use pool::{LedgerError, LedgerResult, Pool, PoolEvent};
pub use types::{Direction, PoolView, Token};
