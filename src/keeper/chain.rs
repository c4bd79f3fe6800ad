//! On-chain gateway
//!
//! Drives a deployed MiniAMM contract over JSON-RPC. The signer must be the
//! contract's `bot()`; this is checked at connect time together with the
//! chain id, so a misconfigured keeper fails before its first cycle. Sends
//! carry an explicit gas limit and skip estimation, so a keeper that loses
//! the role later only sees a mined revert; `bot()` is re-read after every
//! revert to tell the two apart.

use crate::config::KeeperConfig;
use crate::contracts::{MiniAMM, IERC20};
use crate::keeper::error::SubmitError;
use crate::keeper::gateway::{KeeperAction, PoolGateway, TxReceipt};
use crate::pool::LedgerError;
use crate::types::PoolView;
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Revert reason the contract uses for its operator check
const ONLY_BOT_REVERT: &str = "Only bot";

pub struct ChainGateway {
    provider: DynProvider,
    pool: MiniAMM::MiniAMMInstance<DynProvider>,
    token_a: IERC20::IERC20Instance<DynProvider>,
    token_b: IERC20::IERC20Instance<DynProvider>,
    operator: Address,
    gas_limit: u64,
    confirmation_timeout: Duration,
}

impl ChainGateway {
    /// Connect, then verify chain id and operator role
    pub async fn connect(config: &KeeperConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .require_private_key()?
            .parse()
            .context("PRIVATE_KEY is not a valid secp256k1 key")?;
        let operator = signer.address();
        let address = config.require_contract_address()?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(&config.network.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to {}", config.network.rpc_url))?
            .erased();

        let chain_id = provider.get_chain_id().await.context("Failed to read chain id")?;
        if chain_id != config.network.chain_id {
            bail!(
                "chain id mismatch: node reports {}, config expects {}",
                chain_id,
                config.network.chain_id
            );
        }

        let pool = MiniAMM::new(address, provider.clone());
        let bot = pool.bot().call().await.context("Failed to read bot()")?;
        if bot != operator {
            bail!("signer {} is not the pool operator (bot() = {})", operator, bot);
        }

        let token_a_address = pool.tokenA().call().await.context("Failed to read tokenA()")?;
        let token_b_address = pool.tokenB().call().await.context("Failed to read tokenB()")?;
        info!(
            "Connected to MiniAMM {} on chain {} (tokenA={}, tokenB={}, operator={})",
            address, chain_id, token_a_address, token_b_address, operator
        );

        Ok(Self {
            token_a: IERC20::new(token_a_address, provider.clone()),
            token_b: IERC20::new(token_b_address, provider.clone()),
            provider,
            pool,
            operator,
            gas_limit: config.transactions.gas_limit,
            confirmation_timeout: config.transactions.confirmation_timeout(),
        })
    }

    /// Map a send-time failure, recognising the operator check
    fn classify_send_error(&self, err: alloy::contract::Error) -> SubmitError {
        let message = err.to_string();
        if message.contains(ONLY_BOT_REVERT) {
            SubmitError::Rejected(LedgerError::Unauthorized { caller: self.operator })
        } else {
            SubmitError::Transport(anyhow::Error::new(err).context("Failed to send transaction"))
        }
    }

    /// Decide why `tx_ref` reverted by asking the contract who its operator is now
    async fn explain_revert(&self, tx_ref: String) -> SubmitError {
        let current_bot = match self.pool.bot().call().await {
            Ok(bot) => Some(bot),
            Err(e) => {
                warn!("Failed to re-read bot() after revert of {}: {}", tx_ref, e);
                None
            }
        };
        classify_revert(self.operator, current_bot, tx_ref)
    }
}

/// A revert while someone else holds the operator role is an authorization
/// failure, not a transient one. An unreadable `bot()` leaves it retryable.
fn classify_revert(operator: Address, current_bot: Option<Address>, tx_ref: String) -> SubmitError {
    match current_bot {
        Some(bot) if bot != operator => {
            warn!("{} reverted: operator role moved from {} to {}", tx_ref, operator, bot);
            SubmitError::Rejected(LedgerError::Unauthorized { caller: operator })
        }
        _ => SubmitError::Reverted { tx_ref },
    }
}

#[async_trait]
impl PoolGateway for ChainGateway {
    async fn snapshot(&self) -> Result<PoolView> {
        let reserves = self.pool.getReserves().call().await.context("getReserves() failed")?;
        let fees = self.pool.getFees().call().await.context("getFees() failed")?;
        let total_shares = self
            .pool
            .totalSupply()
            .call()
            .await
            .context("totalSupply() failed")?;
        let held_a = self
            .token_a
            .balanceOf(*self.pool.address())
            .call()
            .await
            .context("tokenA balanceOf() failed")?;
        let held_b = self
            .token_b
            .balanceOf(*self.pool.address())
            .call()
            .await
            .context("tokenB balanceOf() failed")?;

        // Whatever the contract holds beyond reserves and fees is float
        let float_a = held_a.saturating_sub(reserves.reserveA.saturating_add(fees.feeA));
        let float_b = held_b.saturating_sub(reserves.reserveB.saturating_add(fees.feeB));

        Ok(PoolView {
            reserve_a: reserves.reserveA,
            reserve_b: reserves.reserveB,
            fee_a: fees.feeA,
            fee_b: fees.feeB,
            total_shares,
            float_a,
            float_b,
        })
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.context("Failed to read gas price")
    }

    fn operator(&self) -> Address {
        self.operator
    }

    async fn submit(&self, action: &KeeperAction) -> Result<TxReceipt, SubmitError> {
        let sent = match *action {
            KeeperAction::CompoundFees => {
                self.pool.compoundFees().gas(self.gas_limit).send().await
            }
            KeeperAction::Rebalance { amount_in, direction } => {
                self.pool
                    .rebalance(amount_in, direction.is_a_to_b())
                    .gas(self.gas_limit)
                    .send()
                    .await
            }
        };
        let pending = sent.map_err(|e| self.classify_send_error(e))?;
        let tx_ref = format!("{:#x}", pending.tx_hash());
        debug!("{} sent: {}", action.kind(), tx_ref);

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| SubmitError::Unconfirmed {
                tx_ref: Some(tx_ref.clone()),
                reason: e.to_string(),
            })?;

        if !receipt.status() {
            return Err(self.explain_revert(tx_ref).await);
        }
        Ok(TxReceipt {
            tx_ref,
            gas_used: receipt.gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_after_role_moved_is_fatal() {
        let operator = Address::repeat_byte(0x0b);
        let err = classify_revert(operator, Some(Address::repeat_byte(0x0c)), "0xab".to_string());
        assert!(matches!(
            err,
            SubmitError::Rejected(LedgerError::Unauthorized { caller }) if caller == operator
        ));
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_revert_while_still_operator_is_retryable() {
        let operator = Address::repeat_byte(0x0b);
        let err = classify_revert(operator, Some(operator), "0xab".to_string());
        assert!(matches!(err, SubmitError::Reverted { ref tx_ref } if tx_ref == "0xab"));
        assert!(err.is_retryable());

        let unknown = classify_revert(operator, None, "0xcd".to_string());
        assert!(matches!(unknown, SubmitError::Reverted { .. }));
        assert!(!unknown.is_fatal());
    }
}
