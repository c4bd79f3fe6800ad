//! Pool gateway
//!
//! The seam between the keeper and whatever pool it drives. `LocalGateway`
//! wraps an in-process `Pool`; `ChainGateway` (see `chain.rs`) talks to a
//! deployed contract.

use crate::keeper::error::SubmitError;
use crate::pool::Pool;
use crate::types::{Direction, PoolView};
use alloy::primitives::{keccak256, Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Gas charged by the local gateway per action kind
const LOCAL_COMPOUND_GAS: u64 = 95_000;
const LOCAL_REBALANCE_GAS: u64 = 120_000;

/// Kind of keeper action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Compound,
    Rebalance,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActionKind::Compound => write!(f, "compound"),
            ActionKind::Rebalance => write!(f, "rebalance"),
        }
    }
}

/// An operator transaction the keeper submits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperAction {
    CompoundFees,
    Rebalance { amount_in: U256, direction: Direction },
}

impl KeeperAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            KeeperAction::CompoundFees => ActionKind::Compound,
            KeeperAction::Rebalance { .. } => ActionKind::Rebalance,
        }
    }
}

/// Confirmation of a landed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_ref: String,
    pub gas_used: u64,
}

#[async_trait]
pub trait PoolGateway: Send + Sync {
    /// Current reserves, fees, supply and float
    async fn snapshot(&self) -> Result<PoolView>;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Identity the keeper submits as
    fn operator(&self) -> Address;

    /// Submit one action and wait for its confirmation
    async fn submit(&self, action: &KeeperAction) -> Result<TxReceipt, SubmitError>;
}

/// Gateway over an in-process pool
pub struct LocalGateway {
    pool: Arc<RwLock<Pool>>,
    operator: Address,
    gas_price_wei: AtomicU64,
    nonce: AtomicU64,
}

impl LocalGateway {
    pub fn new(pool: Arc<RwLock<Pool>>, operator: Address, gas_price_gwei: u64) -> Self {
        Self {
            pool,
            operator,
            gas_price_wei: AtomicU64::new(gas_price_gwei.saturating_mul(1_000_000_000)),
            nonce: AtomicU64::new(0),
        }
    }

    /// Shared handle to the underlying pool
    pub fn pool(&self) -> Arc<RwLock<Pool>> {
        self.pool.clone()
    }

    /// Simulate a gas price move
    pub fn set_gas_price_gwei(&self, gwei: u64) {
        self.gas_price_wei
            .store(gwei.saturating_mul(1_000_000_000), Ordering::Relaxed);
    }

    fn next_tx_ref(&self) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut preimage = self.operator.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        format!("{:#x}", keccak256(&preimage))
    }
}

#[async_trait]
impl PoolGateway for LocalGateway {
    async fn snapshot(&self) -> Result<PoolView> {
        Ok(self.pool.read().await.view())
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.gas_price_wei.load(Ordering::Relaxed) as u128)
    }

    fn operator(&self) -> Address {
        self.operator
    }

    async fn submit(&self, action: &KeeperAction) -> Result<TxReceipt, SubmitError> {
        let mut pool = self.pool.write().await;
        let gas_used = match *action {
            KeeperAction::CompoundFees => {
                pool.compound_fees(self.operator)?;
                LOCAL_COMPOUND_GAS
            }
            KeeperAction::Rebalance { amount_in, direction } => {
                pool.rebalance(self.operator, amount_in, direction)?;
                LOCAL_REBALANCE_GAS
            }
        };
        for event in pool.take_events() {
            debug!(event = event.name(), "{:?}", event);
        }
        Ok(TxReceipt {
            tx_ref: self.next_tx_ref(),
            gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::LedgerError;
    use crate::types::Token;
    use tokio_test::assert_ok;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000_000_000_000u64)
    }

    fn gateway(operator: Address) -> LocalGateway {
        let mut pool = Pool::new(Address::repeat_byte(1));
        pool.add_liquidity(Address::repeat_byte(1), ether(1_000), ether(1_200)).unwrap();
        pool.fund_float(Address::repeat_byte(1), Token::A, ether(10)).unwrap();
        pool.take_events();
        LocalGateway::new(Arc::new(RwLock::new(pool)), operator, 30)
    }

    #[tokio::test]
    async fn test_local_rebalance_submission() {
        let gateway = gateway(Address::repeat_byte(1));
        let before = gateway.snapshot().await.unwrap();

        let receipt = assert_ok!(
            gateway
                .submit(&KeeperAction::Rebalance {
                    amount_in: ether(5),
                    direction: Direction::AToB,
                })
                .await
        );

        assert_eq!(receipt.gas_used, LOCAL_REBALANCE_GAS);
        assert!(receipt.tx_ref.starts_with("0x"));
        let after = gateway.snapshot().await.unwrap();
        assert!(after.price() < before.price());
        assert_eq!(after.float_a, ether(5));
        // Events are drained once logged
        assert!(gateway.pool().read().await.pending_events().is_empty());
    }

    #[tokio::test]
    async fn test_local_rejection_is_surfaced() {
        let gateway = gateway(Address::repeat_byte(9));
        let err = gateway.submit(&KeeperAction::CompoundFees).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(LedgerError::Unauthorized { .. })));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_tx_refs_are_unique() {
        let gateway = gateway(Address::repeat_byte(1));
        let first = gateway.submit(&KeeperAction::CompoundFees).await.unwrap();
        let second = gateway.submit(&KeeperAction::CompoundFees).await.unwrap();
        assert_ne!(first.tx_ref, second.tx_ref);
    }

    #[tokio::test]
    async fn test_gas_price_override() {
        let gateway = gateway(Address::repeat_byte(1));
        assert_eq!(gateway.gas_price().await.unwrap(), 30_000_000_000);
        gateway.set_gas_price_gwei(150);
        assert_eq!(gateway.gas_price().await.unwrap(), 150_000_000_000);
    }
}
