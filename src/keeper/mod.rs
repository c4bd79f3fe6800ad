//! Keeper module
//!
//! Autonomous operator that compounds fees and rebalances the pool on two
//! periodic triggers, through a gateway to either an in-process pool or a
//! deployed contract.

pub mod chain;
pub mod error;
pub mod gateway;
pub mod history;
pub mod scheduler;
pub mod submitter;
pub mod traffic;

pub use chain::ChainGateway;
pub use error::SubmitError;
pub use gateway::{ActionKind, KeeperAction, LocalGateway, PoolGateway, TxReceipt};
pub use history::{ActionHistory, ActionRecord, ActionStatus, KeeperStatus};
pub use scheduler::{CycleOutcome, KeeperScheduler};
pub use submitter::{SubmitOutcome, Submitter};
pub use traffic::TrafficGenerator;
