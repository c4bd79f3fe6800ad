//! Price Calculator
//!
//! Pure constant-product math (x * y = k) shared by the ledger and the keeper.
//! All divisions floor; rounding always favours the pool.

use crate::pool::error::{LedgerError, LedgerResult};
use crate::types::{Direction, BPS_DENOMINATOR, FEE_BPS, PRICE_SCALE};
use alloy::primitives::U256;
use tracing::debug;

/// Stateless constant-product calculator
pub struct PriceCalculator;

impl PriceCalculator {
    /// Split a gross input into (net amount that reaches the reserve, fee)
    ///
    /// net = amount_in * 9970 / 10000 (floor), fee = amount_in - net
    pub fn split_fee(amount_in: U256) -> LedgerResult<(U256, U256)> {
        let net = amount_in
            .checked_mul(U256::from(BPS_DENOMINATOR - FEE_BPS))
            .ok_or(LedgerError::Overflow("fee split"))?
            / U256::from(BPS_DENOMINATOR);
        Ok((net, amount_in - net))
    }

    /// Calculate amount out for a given gross input
    ///
    /// Formula: amount_out = net * reserve_out / (reserve_in + net)
    ///
    /// This is `reserve_out - ceil(k / (reserve_in + net))`, so the reserve
    /// product after the trade is never below k.
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> LedgerResult<U256> {
        if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
            return Ok(U256::ZERO);
        }

        let (net, _fee) = Self::split_fee(amount_in)?;
        let numerator = net
            .checked_mul(reserve_out)
            .ok_or(LedgerError::Overflow("amount out"))?;
        let denominator = reserve_in
            .checked_add(net)
            .ok_or(LedgerError::Overflow("amount out"))?;

        Ok(numerator / denominator)
    }

    /// Integer square root (floor) using the Babylonian method
    pub fn sqrt(value: U256) -> U256 {
        if value <= U256::from(1u64) {
            return value;
        }
        let mut x0 = value;
        // ceil(value / 2) without overflowing at U256::MAX
        let mut x1 = (value >> 1usize) + (value & U256::from(1u64));
        while x1 < x0 {
            x0 = x1;
            x1 = (x0 + value / x0) >> 1usize;
        }
        x0
    }

    /// Shares for the first deposit: floor(sqrt(amount_a * amount_b))
    pub fn initial_shares(amount_a: U256, amount_b: U256) -> LedgerResult<U256> {
        let product = amount_a
            .checked_mul(amount_b)
            .ok_or(LedgerError::Overflow("initial shares"))?;
        Ok(Self::sqrt(product))
    }

    /// Shares for one side of a subsequent deposit: amount * total / reserve
    pub fn side_shares(amount: U256, reserve: U256, total_shares: U256) -> LedgerResult<U256> {
        if reserve.is_zero() {
            return Err(LedgerError::EmptyPool);
        }
        let numerator = amount
            .checked_mul(total_shares)
            .ok_or(LedgerError::Overflow("share issuance"))?;
        Ok(numerator / reserve)
    }

    /// Shares for a subsequent deposit: the binding (smaller) side wins
    pub fn proportional_shares(
        amount_a: U256,
        amount_b: U256,
        reserve_a: U256,
        reserve_b: U256,
        total_shares: U256,
    ) -> LedgerResult<U256> {
        let by_a = Self::side_shares(amount_a, reserve_a, total_shares)?;
        let by_b = Self::side_shares(amount_b, reserve_b, total_shares)?;
        Ok(by_a.min(by_b))
    }

    /// Pro-rata reserve amount for redeeming `shares`
    pub fn redeem_amount(shares: U256, reserve: U256, total_shares: U256) -> LedgerResult<U256> {
        if total_shares.is_zero() {
            return Err(LedgerError::EmptyPool);
        }
        let numerator = shares
            .checked_mul(reserve)
            .ok_or(LedgerError::Overflow("redeem amount"))?;
        Ok(numerator / total_shares)
    }

    /// Gross input that moves the price onto `target_price` without overshooting
    ///
    /// Holding k = reserve_a * reserve_b, the input reserve that lands exactly
    /// on the target is sqrt(k / target) for A in, sqrt(k * target) for B in.
    /// The net difference is grossed up for the fee and floored, so the
    /// post-fee input never exceeds the ideal one.
    ///
    /// Returns None when the pool is empty or already at the target.
    pub fn correcting_amount_in(
        reserve_a: U256,
        reserve_b: U256,
        target_price: U256,
    ) -> LedgerResult<Option<(Direction, U256)>> {
        if reserve_a.is_zero() || reserve_b.is_zero() || target_price.is_zero() {
            return Ok(None);
        }

        let k = reserve_a
            .checked_mul(reserve_b)
            .ok_or(LedgerError::Overflow("rebalance sizing"))?;
        let price = reserve_b
            .checked_mul(PRICE_SCALE)
            .ok_or(LedgerError::Overflow("rebalance sizing"))?
            / reserve_a;

        let (direction, reserve_in, ideal_in) = if price > target_price {
            let scaled = k
                .checked_mul(PRICE_SCALE)
                .ok_or(LedgerError::Overflow("rebalance sizing"))?;
            (Direction::AToB, reserve_a, Self::sqrt(scaled / target_price))
        } else if price < target_price {
            let scaled = k
                .checked_mul(target_price)
                .ok_or(LedgerError::Overflow("rebalance sizing"))?;
            (Direction::BToA, reserve_b, Self::sqrt(scaled / PRICE_SCALE))
        } else {
            return Ok(None);
        };

        if ideal_in <= reserve_in {
            return Ok(None);
        }

        let net = ideal_in - reserve_in;
        let gross = net
            .checked_mul(U256::from(BPS_DENOMINATOR))
            .ok_or(LedgerError::Overflow("rebalance sizing"))?
            / U256::from(BPS_DENOMINATOR - FEE_BPS);

        debug!(
            "Rebalance sizing: price={} target={} dir={} reserve_in={} ideal_in={} gross={}",
            price, target_price, direction, reserve_in, ideal_in, gross
        );

        if gross.is_zero() {
            return Ok(None);
        }
        Ok(Some((direction, gross)))
    }
}
