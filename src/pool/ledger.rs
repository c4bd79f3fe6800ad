//! Pool Ledger
//!
//! Single source of truth for reserves, fee buckets, float and LP shares.
//! Swap, liquidity, compounding, rebalancing and access control are
//! implemented as further `impl Pool` blocks in their own modules and mutate
//! state only through the primitives below.
//!
//! Every public mutating operation validates before it mutates, so a failed
//! call leaves the pool exactly as it was.

use crate::pool::error::{LedgerError, LedgerResult};
use crate::pool::events::PoolEvent;
use crate::types::{PoolView, Token};
use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

/// The constant-product pool
#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) reserve_a: U256,
    pub(crate) reserve_b: U256,
    pub(crate) fee_a: U256,
    pub(crate) fee_b: U256,
    pub(crate) float_a: U256,
    pub(crate) float_b: U256,
    pub(crate) total_shares: U256,
    pub(crate) operator: Address,
    pub(crate) share_balances: HashMap<Address, U256>,
    /// Ordered outbox of emitted events
    pub(crate) events: Vec<PoolEvent>,
}

impl Pool {
    /// Create an empty pool with its initial operator
    pub fn new(operator: Address) -> Self {
        debug!("Pool created with operator {}", operator);
        Self {
            reserve_a: U256::ZERO,
            reserve_b: U256::ZERO,
            fee_a: U256::ZERO,
            fee_b: U256::ZERO,
            float_a: U256::ZERO,
            float_b: U256::ZERO,
            total_shares: U256::ZERO,
            operator,
            share_balances: HashMap::new(),
            events: Vec::new(),
        }
    }

    // ── Read surface ─────────────────────────────────────────────────

    pub fn view(&self) -> PoolView {
        PoolView {
            reserve_a: self.reserve_a,
            reserve_b: self.reserve_b,
            fee_a: self.fee_a,
            fee_b: self.fee_b,
            total_shares: self.total_shares,
            float_a: self.float_a,
            float_b: self.float_b,
        }
    }

    /// reserve_b / reserve_a as 18-decimal fixed point
    pub fn price(&self) -> LedgerResult<U256> {
        if self.reserve_a.is_zero() {
            return Err(LedgerError::EmptyPool);
        }
        self.view().price().ok_or(LedgerError::Overflow("price"))
    }

    /// Alias matching the contract's `getPrice()`
    pub fn get_price(&self) -> LedgerResult<U256> {
        self.price()
    }

    pub fn get_reserves(&self) -> (U256, U256) {
        (self.reserve_a, self.reserve_b)
    }

    pub fn get_fees(&self) -> (U256, U256) {
        (self.fee_a, self.fee_b)
    }

    pub fn balance_of(&self, holder: &Address) -> U256 {
        self.share_balances.get(holder).copied().unwrap_or(U256::ZERO)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_shares
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn is_empty(&self) -> bool {
        self.total_shares.is_zero()
    }

    /// Drain emitted events in emission order
    pub fn take_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events emitted since the last drain
    pub fn pending_events(&self) -> &[PoolEvent] {
        &self.events
    }

    // ── Internal primitives ──────────────────────────────────────────

    pub(crate) fn emit(&mut self, event: PoolEvent) {
        debug!("Pool event: {}", event.name());
        self.events.push(event);
    }

    fn reserve_slot(&mut self, token: Token) -> &mut U256 {
        match token {
            Token::A => &mut self.reserve_a,
            Token::B => &mut self.reserve_b,
        }
    }

    fn fee_slot(&mut self, token: Token) -> &mut U256 {
        match token {
            Token::A => &mut self.fee_a,
            Token::B => &mut self.fee_b,
        }
    }

    fn float_slot(&mut self, token: Token) -> &mut U256 {
        match token {
            Token::A => &mut self.float_a,
            Token::B => &mut self.float_b,
        }
    }

    pub(crate) fn reserve_of(&self, token: Token) -> U256 {
        match token {
            Token::A => self.reserve_a,
            Token::B => self.reserve_b,
        }
    }

    pub(crate) fn float_of(&self, token: Token) -> U256 {
        match token {
            Token::A => self.float_a,
            Token::B => self.float_b,
        }
    }

    pub(crate) fn credit_reserve(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        credit(self.reserve_slot(token), amount, "reserve credit")
    }

    pub(crate) fn debit_reserve(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        debit(self.reserve_slot(token), amount, "reserve", token)
    }

    pub(crate) fn credit_fee(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        credit(self.fee_slot(token), amount, "fee credit")
    }

    pub(crate) fn debit_fee(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        debit(self.fee_slot(token), amount, "fee", token)
    }

    pub(crate) fn credit_float(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        credit(self.float_slot(token), amount, "float credit")
    }

    pub(crate) fn debit_float(&mut self, token: Token, amount: U256) -> LedgerResult<()> {
        debit(self.float_slot(token), amount, "float", token)
    }

    pub(crate) fn mint_shares(&mut self, holder: Address, amount: U256) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let total = self
            .total_shares
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("share mint"))?;
        let balance = self.share_balances.entry(holder).or_insert(U256::ZERO);
        *balance += amount;
        self.total_shares = total;
        Ok(())
    }

    pub(crate) fn burn_shares(&mut self, holder: Address, amount: U256) -> LedgerResult<()> {
        let balance = self.balance_of(&holder);
        if amount > balance {
            return Err(LedgerError::InsufficientShares {
                holder,
                requested: amount,
                balance,
            });
        }
        let remaining = balance - amount;
        if remaining.is_zero() {
            self.share_balances.remove(&holder);
        } else {
            self.share_balances.insert(holder, remaining);
        }
        self.total_shares -= amount;
        Ok(())
    }

    pub(crate) fn require_operator(&self, caller: Address) -> LedgerResult<()> {
        if caller != self.operator {
            return Err(LedgerError::Unauthorized { caller });
        }
        Ok(())
    }
}

fn credit(slot: &mut U256, amount: U256, what: &'static str) -> LedgerResult<()> {
    *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow(what))?;
    Ok(())
}

fn debit(slot: &mut U256, amount: U256, bucket: &'static str, token: Token) -> LedgerResult<()> {
    if amount > *slot {
        return Err(LedgerError::InsufficientReserve {
            bucket,
            token,
            requested: amount,
            available: *slot,
        });
    }
    *slot -= amount;
    Ok(())
}
