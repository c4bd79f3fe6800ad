//! Pool ledger module
//!
//! The two-token constant-product pool: reserves, fee buckets, float and LP
//! shares, plus the operations that move them (swap, liquidity, compounding,
//! rebalancing, operator transfer).

pub mod access;
pub mod calculator;
pub mod compound;
pub mod error;
pub mod events;
pub mod ledger;
pub mod liquidity;
pub mod rebalance;
pub mod swap;

pub use calculator::PriceCalculator;
pub use error::{LedgerError, LedgerResult};
pub use events::PoolEvent;
pub use ledger::Pool;
