//! Liquidity Manager
//!
//! Issues and redeems LP shares. The first deposit sets the starting price
//! and mints the geometric mean of the two amounts; later deposits mint
//! against the binding side with no refund of the excess.

use crate::pool::calculator::PriceCalculator;
use crate::pool::error::{LedgerError, LedgerResult};
use crate::pool::events::PoolEvent;
use crate::pool::ledger::Pool;
use crate::types::Token;
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{debug, info};

impl Pool {
    /// Deposit both tokens and receive LP shares
    pub fn add_liquidity(
        &mut self,
        caller: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> LedgerResult<U256> {
        if amount_a.is_zero() {
            return Err(LedgerError::ZeroAmount("amount A"));
        }
        if amount_b.is_zero() {
            return Err(LedgerError::ZeroAmount("amount B"));
        }

        let first_deposit = self.total_shares.is_zero();
        let shares = if first_deposit {
            PriceCalculator::initial_shares(amount_a, amount_b)?
        } else {
            PriceCalculator::proportional_shares(
                amount_a,
                amount_b,
                self.reserve_a,
                self.reserve_b,
                self.total_shares,
            )?
        };
        if shares.is_zero() {
            return Err(LedgerError::InsufficientLiquidity("deposit mints zero shares"));
        }
        self.reserve_a
            .checked_add(amount_a)
            .ok_or(LedgerError::Overflow("reserve credit"))?;
        self.reserve_b
            .checked_add(amount_b)
            .ok_or(LedgerError::Overflow("reserve credit"))?;
        self.total_shares
            .checked_add(shares)
            .ok_or(LedgerError::Overflow("share mint"))?;

        self.credit_reserve(Token::A, amount_a)?;
        self.credit_reserve(Token::B, amount_b)?;
        self.mint_shares(caller, shares)?;

        if first_deposit {
            info!(
                "Pool initialized by {}: reserves=({}, {}) shares={}",
                caller, amount_a, amount_b, shares
            );
        } else {
            debug!("Mint: {} deposited ({}, {}) for {} shares", caller, amount_a, amount_b, shares);
        }

        self.emit(PoolEvent::Mint {
            provider: caller,
            amount_a,
            amount_b,
            shares,
            timestamp: Utc::now(),
        });
        Ok(shares)
    }

    /// Burn LP shares and withdraw the pro-rata reserves
    pub fn remove_liquidity(
        &mut self,
        caller: Address,
        shares: U256,
    ) -> LedgerResult<(U256, U256)> {
        if shares.is_zero() {
            return Err(LedgerError::ZeroAmount("shares"));
        }
        let balance = self.balance_of(&caller);
        if shares > balance {
            return Err(LedgerError::InsufficientShares {
                holder: caller,
                requested: shares,
                balance,
            });
        }

        let amount_a = PriceCalculator::redeem_amount(shares, self.reserve_a, self.total_shares)?;
        let amount_b = PriceCalculator::redeem_amount(shares, self.reserve_b, self.total_shares)?;
        if amount_a.is_zero() && amount_b.is_zero() {
            return Err(LedgerError::InsufficientLiquidity("burn redeems nothing"));
        }

        self.burn_shares(caller, shares)?;
        self.debit_reserve(Token::A, amount_a)?;
        self.debit_reserve(Token::B, amount_b)?;

        debug!("Burn: {} redeemed {} shares for ({}, {})", caller, shares, amount_a, amount_b);

        self.emit(PoolEvent::Burn {
            provider: caller,
            amount_a,
            amount_b,
            shares,
            timestamp: Utc::now(),
        });
        Ok((amount_a, amount_b))
    }
}
