//! Access Control
//!
//! A single mutable operator identity. Handoff is immediate: no pending
//! state, no timelock.

use crate::pool::error::LedgerResult;
use crate::pool::events::PoolEvent;
use crate::pool::ledger::Pool;
use alloy::primitives::Address;
use tracing::info;

impl Pool {
    /// Transfer the operator role (current operator only)
    pub fn set_operator(&mut self, caller: Address, new_operator: Address) -> LedgerResult<()> {
        self.require_operator(caller)?;
        let old = self.operator;
        self.operator = new_operator;
        info!("Operator updated: {} -> {}", old, new_operator);
        self.emit(PoolEvent::OperatorUpdated {
            old,
            new: new_operator,
        });
        Ok(())
    }
}
