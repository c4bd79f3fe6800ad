//! Core data structures shared by the ledger and the keeper
//!
//! Amounts are `U256` in the token's smallest unit. Prices are 18-decimal
//! fixed point (`PRICE_SCALE` == 1.0), matching the on-chain `getPrice()`.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Swap fee in basis points (0.30%), charged on the input amount
pub const FEE_BPS: u64 = 30;

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point scale for prices: 1e18 == 1.0
pub const PRICE_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Decimal places carried by `PRICE_SCALE`
pub const PRICE_DECIMALS: u32 = 18;

/// One of the two reserve assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    A,
    B,
}

impl Token {
    pub fn other(self) -> Token {
        match self {
            Token::A => Token::B,
            Token::B => Token::A,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::A => write!(f, "A"),
            Token::B => write!(f, "B"),
        }
    }
}

/// Trade direction: which token goes in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "AtoB")]
    AToB,
    #[serde(rename = "BtoA")]
    BToA,
}

impl Direction {
    /// Build from the contract's `AtoB` flag
    pub fn from_a_to_b(a_to_b: bool) -> Self {
        if a_to_b {
            Direction::AToB
        } else {
            Direction::BToA
        }
    }

    pub fn is_a_to_b(self) -> bool {
        matches!(self, Direction::AToB)
    }

    pub fn token_in(self) -> Token {
        match self {
            Direction::AToB => Token::A,
            Direction::BToA => Token::B,
        }
    }

    pub fn token_out(self) -> Token {
        self.token_in().other()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::AToB => write!(f, "AtoB"),
            Direction::BToA => write!(f, "BtoA"),
        }
    }
}

/// Read-only snapshot of the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub fee_a: U256,
    pub fee_b: U256,
    pub total_shares: U256,
    /// Tokens held outside reserves and fees (rebalance float)
    pub float_a: U256,
    pub float_b: U256,
}

impl PoolView {
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero()
    }

    /// Reserves ordered as (in, out) for a direction
    pub fn reserves_for(&self, direction: Direction) -> (U256, U256) {
        match direction {
            Direction::AToB => (self.reserve_a, self.reserve_b),
            Direction::BToA => (self.reserve_b, self.reserve_a),
        }
    }

    pub fn float_of(&self, token: Token) -> U256 {
        match token {
            Token::A => self.float_a,
            Token::B => self.float_b,
        }
    }

    /// Fixed-point price (reserve_b / reserve_a scaled by 1e18), None when empty
    pub fn price(&self) -> Option<U256> {
        if self.reserve_a.is_zero() {
            return None;
        }
        self.reserve_b
            .checked_mul(PRICE_SCALE)
            .map(|scaled| scaled / self.reserve_a)
    }
}

/// Convert an 18-decimal fixed-point price into a Decimal
pub fn price_to_decimal(price: U256) -> Option<Decimal> {
    let raw = u128::try_from(price).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, PRICE_DECIMALS).ok()
}

/// Convert a Decimal price into 18-decimal fixed point (truncating)
pub fn decimal_to_price(price: Decimal) -> Option<U256> {
    decimal_to_units(price, PRICE_DECIMALS)
}

/// Convert a human token amount (e.g. 0.001) into smallest units (truncating)
pub fn decimal_to_units(amount: Decimal, decimals: u32) -> Option<U256> {
    use rust_decimal::prelude::ToPrimitive;

    if amount.is_sign_negative() {
        return None;
    }
    let scale = Decimal::from(10u64.checked_pow(decimals)?);
    let scaled = amount.checked_mul(scale)?;
    scaled.trunc().to_u128().map(U256::from)
}
