//! Fee Compounder
//!
//! Folds the fee buckets back into the reserves as if they were a fresh
//! deposit and mints the resulting shares to the operator. Share value grows
//! for every holder; the operator's cut is proportional to the fees folded.

use crate::pool::calculator::PriceCalculator;
use crate::pool::error::{LedgerError, LedgerResult};
use crate::pool::events::PoolEvent;
use crate::pool::ledger::Pool;
use crate::types::Token;
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{debug, info, warn};

impl Pool {
    /// Compound accrued fees into the reserves (operator only)
    ///
    /// Returns the shares minted to the operator. Succeeds with zero shares
    /// and no event when there is nothing to compound, or when the pool has
    /// been fully withdrawn (the fees then wait for the next deposit).
    pub fn compound_fees(&mut self, caller: Address) -> LedgerResult<U256> {
        self.require_operator(caller)?;

        let (fee_a, fee_b) = self.get_fees();
        if fee_a.is_zero() && fee_b.is_zero() {
            debug!("Compound: no fees accrued");
            return Ok(U256::ZERO);
        }
        if self.is_empty() {
            warn!("Compound: pool is empty, leaving fees ({}, {}) in their buckets", fee_a, fee_b);
            return Ok(U256::ZERO);
        }

        // Subsequent-deposit formula over the non-empty buckets; an empty
        // bucket adds nothing to its reserve and must not bind issuance.
        let shares = match (fee_a.is_zero(), fee_b.is_zero()) {
            (false, false) => PriceCalculator::proportional_shares(
                fee_a,
                fee_b,
                self.reserve_a,
                self.reserve_b,
                self.total_shares,
            )?,
            (false, true) => {
                PriceCalculator::side_shares(fee_a, self.reserve_a, self.total_shares)?
            }
            _ => PriceCalculator::side_shares(fee_b, self.reserve_b, self.total_shares)?,
        };
        self.reserve_a
            .checked_add(fee_a)
            .ok_or(LedgerError::Overflow("reserve credit"))?;
        self.reserve_b
            .checked_add(fee_b)
            .ok_or(LedgerError::Overflow("reserve credit"))?;

        self.debit_fee(Token::A, fee_a)?;
        self.debit_fee(Token::B, fee_b)?;
        self.credit_reserve(Token::A, fee_a)?;
        self.credit_reserve(Token::B, fee_b)?;
        let operator = self.operator;
        self.mint_shares(operator, shares)?;

        info!(
            "Fees compounded: fee_a={} fee_b={} -> {} shares to operator {}",
            fee_a, fee_b, shares, operator
        );

        self.emit(PoolEvent::FeeCollected {
            fee_a,
            fee_b,
            shares,
            timestamp: Utc::now(),
        });
        Ok(shares)
    }
}
