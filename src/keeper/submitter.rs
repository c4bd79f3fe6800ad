//! Transaction submitter
//!
//! Every keeper transaction goes through one `Submitter`. It admits one
//! submission at a time, refuses to send above the gas ceiling, bounds each
//! attempt by the confirmation timeout and retries transient failures.
//! Shutdown interrupts the wait between retries.

use crate::config::TxConfig;
use crate::keeper::error::SubmitError;
use crate::keeper::gateway::{KeeperAction, PoolGateway, TxReceipt};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Confirmed(TxReceipt),
    /// Gas price above the ceiling; nothing was sent
    Deferred { gas_price: u128 },
    /// Shutdown arrived while waiting to retry
    Cancelled,
}

pub struct Submitter {
    gateway: Arc<dyn PoolGateway>,
    policy: TxConfig,
    in_flight: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl Submitter {
    pub fn new(
        gateway: Arc<dyn PoolGateway>,
        policy: TxConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            policy,
            in_flight: Mutex::new(()),
            shutdown,
        }
    }

    /// Submit `action`, retrying up to `retry_attempts` times
    pub async fn submit(&self, action: &KeeperAction) -> Result<SubmitOutcome, SubmitError> {
        let _slot = self.in_flight.lock().await;
        let ceiling = self.policy.max_gas_price_wei();
        let mut attempt: u32 = 0;

        loop {
            let result = match self.gateway.gas_price().await {
                Ok(gas_price) if gas_price > ceiling => {
                    warn!(
                        "Gas price {} gwei above ceiling {} gwei, deferring {}",
                        gas_price / 1_000_000_000,
                        self.policy.max_gas_price_gwei,
                        action.kind()
                    );
                    return Ok(SubmitOutcome::Deferred { gas_price });
                }
                Ok(_) => self.attempt(action).await,
                Err(e) => Err(SubmitError::Transport(e.context("Failed to read gas price"))),
            };

            let err = match result {
                Ok(receipt) => {
                    debug!(
                        "{} confirmed on attempt {}: {}",
                        action.kind(),
                        attempt + 1,
                        receipt.tx_ref
                    );
                    return Ok(SubmitOutcome::Confirmed(receipt));
                }
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.policy.retry_attempts {
                return Err(err);
            }

            attempt += 1;
            warn!(
                "{} attempt {} failed: {}; retrying in {:?} ({}/{})",
                action.kind(),
                attempt,
                err,
                self.policy.retry_delay(),
                attempt,
                self.policy.retry_attempts
            );
            if !self.wait_for_retry().await {
                debug!("Shutdown during retry wait, abandoning {}", action.kind());
                return Ok(SubmitOutcome::Cancelled);
            }
        }
    }

    /// One send bounded by the confirmation timeout
    async fn attempt(&self, action: &KeeperAction) -> Result<TxReceipt, SubmitError> {
        let limit = self.policy.confirmation_timeout();
        match timeout(limit, self.gateway.submit(action)).await {
            Ok(result) => result,
            Err(_) => Err(SubmitError::Unconfirmed {
                tx_ref: None,
                reason: format!("timed out after {:?}", limit),
            }),
        }
    }

    /// Sleep out the retry delay; false if shutdown was signalled first
    async fn wait_for_retry(&self) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = sleep(self.policy.retry_delay()) => true,
            _ = shutdown.changed() => false,
        }
    }
}
