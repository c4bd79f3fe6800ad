//! Submission errors

use crate::pool::LedgerError;
use thiserror::Error;

/// Why a keeper transaction did not land
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The pool refused the operation before any state changed
    #[error("rejected by pool: {0}")]
    Rejected(#[from] LedgerError),

    /// Mined, but execution reverted
    #[error("transaction {tx_ref} reverted")]
    Reverted { tx_ref: String },

    /// No receipt within the confirmation window
    #[error("transaction {} not confirmed: {reason}", tx_ref.as_deref().unwrap_or("(unsent)"))]
    Unconfirmed { tx_ref: Option<String>, reason: String },

    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}

impl SubmitError {
    /// Losing the operator role cannot be fixed by retrying or waiting
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubmitError::Rejected(e) if e.is_unauthorized())
    }

    /// Ledger rejections are deterministic; everything else may clear up
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmitError::Rejected(_))
    }
}
