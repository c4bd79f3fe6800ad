//! Keeper action history and status
//!
//! Keeps the most recent actions in a bounded ring plus running counts, and
//! renders both (with the effective config) as a serializable status.

use crate::config::KeeperConfig;
use crate::keeper::gateway::ActionKind;
use crate::types::Direction;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// One submitted keeper action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
    /// Fees compounded, or the rebalance input on its token's side
    pub amount_a: U256,
    pub amount_b: U256,
    pub direction: Option<Direction>,
    pub tx_ref: Option<String>,
    pub status: ActionStatus,
    pub gas_used: Option<u64>,
    pub error: Option<String>,
}

/// Running totals since start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub compounds: u64,
    pub rebalances: u64,
    pub failures: u64,
    /// Cycles postponed by the gas ceiling
    pub deferrals: u64,
    /// Cycles with nothing to do
    pub skips: u64,
    pub total_gas_used: u64,
}

#[derive(Debug, Clone)]
pub struct ActionHistory {
    records: VecDeque<ActionRecord>,
    capacity: usize,
    counts: ActionCounts,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            counts: ActionCounts::default(),
        }
    }

    pub fn record(&mut self, record: ActionRecord) {
        match (record.status, record.kind) {
            (ActionStatus::Success, ActionKind::Compound) => self.counts.compounds += 1,
            (ActionStatus::Success, ActionKind::Rebalance) => self.counts.rebalances += 1,
            (ActionStatus::Failed, _) => self.counts.failures += 1,
        }
        if let Some(gas) = record.gas_used {
            self.counts.total_gas_used = self.counts.total_gas_used.saturating_add(gas);
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn record_deferral(&mut self) {
        self.counts.deferrals += 1;
    }

    pub fn record_skip(&mut self) {
        self.counts.skips += 1;
    }

    pub fn counts(&self) -> &ActionCounts {
        &self.counts
    }

    /// Most recent first
    pub fn recent(&self) -> Vec<ActionRecord> {
        self.records.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Operational snapshot of the keeper
#[derive(Debug, Clone, Serialize)]
pub struct KeeperStatus {
    pub started_at: DateTime<Utc>,
    pub operator: Address,
    pub halted: bool,
    pub target_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub counts: ActionCounts,
    pub recent_actions: Vec<ActionRecord>,
    /// Effective configuration; the private key is never serialized
    pub config: KeeperConfig,
}
