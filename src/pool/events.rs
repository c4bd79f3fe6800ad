//! Domain events emitted by ledger operations
//!
//! Events are appended to the pool's outbox in emission order and drained by
//! whoever drives the pool (the keeper gateway, an indexer, tests).

use crate::types::{Direction, Token};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PoolEvent {
    Swap {
        actor: Address,
        amount_in: U256,
        amount_out: U256,
        direction: Direction,
        timestamp: DateTime<Utc>,
    },
    Mint {
        provider: Address,
        amount_a: U256,
        amount_b: U256,
        shares: U256,
        timestamp: DateTime<Utc>,
    },
    Burn {
        provider: Address,
        amount_a: U256,
        amount_b: U256,
        shares: U256,
        timestamp: DateTime<Utc>,
    },
    FeeCollected {
        fee_a: U256,
        fee_b: U256,
        shares: U256,
        timestamp: DateTime<Utc>,
    },
    Rebalance {
        amount_in: U256,
        amount_out: U256,
        direction: Direction,
        timestamp: DateTime<Utc>,
    },
    OperatorUpdated {
        old: Address,
        new: Address,
    },
    FloatFunded {
        funder: Address,
        token: Token,
        amount: U256,
    },
    FloatWithdrawn {
        operator: Address,
        token: Token,
        amount: U256,
    },
}

impl PoolEvent {
    /// Event name as emitted by the contract
    pub fn name(&self) -> &'static str {
        match self {
            PoolEvent::Swap { .. } => "Swap",
            PoolEvent::Mint { .. } => "Mint",
            PoolEvent::Burn { .. } => "Burn",
            PoolEvent::FeeCollected { .. } => "FeeCollected",
            PoolEvent::Rebalance { .. } => "Rebalance",
            PoolEvent::OperatorUpdated { .. } => "OperatorUpdated",
            PoolEvent::FloatFunded { .. } => "FloatFunded",
            PoolEvent::FloatWithdrawn { .. } => "FloatWithdrawn",
        }
    }
}
