//! Rebalancer
//!
//! Operator-driven price correction paid for out of the pool's float: tokens
//! held outside reserves and fees, pre-funded by the operator. A rebalance is
//! priced exactly like a swap, fee included, so it cannot extract value the
//! constant product would not allow. Its output lands back in the float.

use crate::pool::error::{LedgerError, LedgerResult};
use crate::pool::events::PoolEvent;
use crate::pool::ledger::Pool;
use crate::types::{Direction, Token};
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{debug, info};

impl Pool {
    /// Pre-fund the float with `amount` of `token`
    pub fn fund_float(&mut self, caller: Address, token: Token, amount: U256) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount("float funding"));
        }
        self.credit_float(token, amount)?;
        debug!("Float funded by {}: {} {}", caller, amount, token);
        self.emit(PoolEvent::FloatFunded {
            funder: caller,
            token,
            amount,
        });
        Ok(())
    }

    /// Withdraw float back to the operator
    pub fn withdraw_float(
        &mut self,
        caller: Address,
        token: Token,
        amount: U256,
    ) -> LedgerResult<()> {
        self.require_operator(caller)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount("float withdrawal"));
        }
        self.debit_float(token, amount)?;
        debug!("Float withdrawn by operator: {} {}", amount, token);
        self.emit(PoolEvent::FloatWithdrawn {
            operator: caller,
            token,
            amount,
        });
        Ok(())
    }

    /// Trade float through the pool to move the price (operator only)
    pub fn rebalance(
        &mut self,
        caller: Address,
        amount_in: U256,
        direction: Direction,
    ) -> LedgerResult<U256> {
        self.require_operator(caller)?;

        let token_in = direction.token_in();
        let available = self.float_of(token_in);
        if amount_in > available {
            return Err(LedgerError::InsufficientReserve {
                bucket: "float",
                token: token_in,
                requested: amount_in,
                available,
            });
        }
        let quote = self.quote_swap(amount_in, direction)?;
        self.float_of(direction.token_out())
            .checked_add(quote.amount_out)
            .ok_or(LedgerError::Overflow("float credit"))?;

        self.debit_float(token_in, amount_in)?;
        self.apply_swap(&quote)?;
        self.credit_float(direction.token_out(), quote.amount_out)?;

        info!(
            "Rebalance {}: {} in (fee {}) -> {} out, price now {:?}",
            direction,
            amount_in,
            quote.fee,
            quote.amount_out,
            self.price().ok()
        );

        self.emit(PoolEvent::Rebalance {
            amount_in,
            amount_out: quote.amount_out,
            direction,
            timestamp: Utc::now(),
        });
        Ok(quote.amount_out)
    }
}
