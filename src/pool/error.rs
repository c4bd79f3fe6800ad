//! Ledger error taxonomy
//!
//! Every ledger failure is synchronous and leaves the pool untouched, so
//! callers can tell "fix your input" apart from "insufficient balance" and
//! "not permitted".

use crate::types::Token;
use alloy::primitives::{Address, U256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Zero input where a positive amount is required
    #[error("zero amount: {0}")]
    ZeroAmount(&'static str),

    /// Pricing or quoting against an uninitialized pool
    #[error("pool is empty")]
    EmptyPool,

    /// A reserve, fee bucket or float would underflow
    #[error("insufficient {bucket} {token}: requested {requested}, available {available}")]
    InsufficientReserve {
        bucket: &'static str,
        token: Token,
        requested: U256,
        available: U256,
    },

    /// The operation would drain the pool or mint/burn nothing
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(&'static str),

    /// Burn/remove exceeds the holder's share balance
    #[error("insufficient shares for {holder}: requested {requested}, balance {balance}")]
    InsufficientShares {
        holder: Address,
        requested: U256,
        balance: U256,
    },

    /// Caller is not the current operator
    #[error("unauthorized: {caller} is not the operator")]
    Unauthorized { caller: Address },

    /// 256-bit arithmetic overflow
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl LedgerError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, LedgerError::Unauthorized { .. })
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
