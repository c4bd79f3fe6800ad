//! Swap Engine
//!
//! Constant-product swaps with a 0.30% fee on the input. The fee is parked in
//! the input token's fee bucket; only the net input reaches the reserve.

use crate::pool::calculator::PriceCalculator;
use crate::pool::error::{LedgerError, LedgerResult};
use crate::pool::events::PoolEvent;
use crate::pool::ledger::Pool;
use crate::types::Direction;
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::debug;

/// Fully priced swap, computed before anything is mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwapQuote {
    pub direction: Direction,
    pub amount_in: U256,
    pub net_in: U256,
    pub fee: U256,
    pub amount_out: U256,
}

impl Pool {
    /// Quote the output for `amount_in` on the current reserves
    pub fn get_amount_out(&self, amount_in: U256, direction: Direction) -> LedgerResult<U256> {
        if amount_in.is_zero() {
            return Err(LedgerError::ZeroAmount("amount in"));
        }
        if self.reserve_a.is_zero() || self.reserve_b.is_zero() {
            return Err(LedgerError::EmptyPool);
        }
        let (reserve_in, reserve_out) = self.view().reserves_for(direction);
        PriceCalculator::get_amount_out(amount_in, reserve_in, reserve_out)
    }

    /// Price and validate a swap without mutating
    pub(crate) fn quote_swap(
        &self,
        amount_in: U256,
        direction: Direction,
    ) -> LedgerResult<SwapQuote> {
        let amount_out = self.get_amount_out(amount_in, direction)?;
        let (net_in, fee) = PriceCalculator::split_fee(amount_in)?;
        let reserve_out = self.reserve_of(direction.token_out());

        if amount_out.is_zero() {
            return Err(LedgerError::ZeroAmount("amount out"));
        }
        if amount_out >= reserve_out {
            return Err(LedgerError::InsufficientLiquidity("swap would drain the pool"));
        }
        self.reserve_of(direction.token_in())
            .checked_add(net_in)
            .ok_or(LedgerError::Overflow("swap reserve"))?;

        Ok(SwapQuote {
            direction,
            amount_in,
            net_in,
            fee,
            amount_out,
        })
    }

    /// Apply a validated quote: credit net input and fee, debit output
    pub(crate) fn apply_swap(&mut self, quote: &SwapQuote) -> LedgerResult<()> {
        let token_in = quote.direction.token_in();
        self.credit_reserve(token_in, quote.net_in)?;
        self.credit_fee(token_in, quote.fee)?;
        self.debit_reserve(quote.direction.token_out(), quote.amount_out)?;
        Ok(())
    }

    /// Swap `amount_in` of the input token for the output token
    ///
    /// Open to any caller. The realized output is exactly the
    /// `get_amount_out` quote on the pre-swap reserves.
    pub fn swap(
        &mut self,
        caller: Address,
        amount_in: U256,
        direction: Direction,
    ) -> LedgerResult<U256> {
        let quote = self.quote_swap(amount_in, direction)?;
        self.apply_swap(&quote)?;

        debug!(
            "Swap {}: {} in (net {}, fee {}) -> {} out by {}",
            direction, amount_in, quote.net_in, quote.fee, quote.amount_out, caller
        );

        self.emit(PoolEvent::Swap {
            actor: caller,
            amount_in,
            amount_out: quote.amount_out,
            direction,
            timestamp: Utc::now(),
        });
        Ok(quote.amount_out)
    }
}
