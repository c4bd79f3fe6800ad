//! Organic trade generator for local mode
//!
//! Replays a fixed, slightly one-sided swap pattern against the in-process
//! pool so the keeper has fees to compound and drift to correct.

use crate::pool::Pool;
use crate::types::Direction;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Out of every `PATTERN_LEN` trades, the first `A_TO_B_TRADES` sell A
const PATTERN_LEN: u64 = 5;
const A_TO_B_TRADES: u64 = 3;

pub struct TrafficGenerator {
    pool: Arc<RwLock<Pool>>,
    trader: Address,
    trade_size: U256,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl TrafficGenerator {
    pub fn new(
        pool: Arc<RwLock<Pool>>,
        trader: Address,
        trade_size: U256,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pool,
            trader,
            trade_size,
            period,
            shutdown,
        }
    }

    /// Direction and size of trade number `step`
    pub fn trade_at(&self, step: u64) -> (Direction, U256) {
        let direction = Direction::from_a_to_b(step % PATTERN_LEN < A_TO_B_TRADES);
        // 0.5x, 1x, 1.5x of the base size
        let multiplier = U256::from(1 + step % 3);
        (direction, self.trade_size * multiplier / U256::from(2u64))
    }

    /// Execute trade number `step`; returns the output amount
    pub async fn trade_once(&self, step: u64) -> Option<U256> {
        let (direction, amount_in) = self.trade_at(step);
        let mut pool = self.pool.write().await;
        match pool.swap(self.trader, amount_in, direction) {
            Ok(amount_out) => {
                pool.take_events();
                debug!("Organic swap #{} {}: {} -> {}", step, direction, amount_in, amount_out);
                Some(amount_out)
            }
            Err(e) => {
                warn!("Organic swap #{} {} of {} rejected: {}", step, direction, amount_in, e);
                None
            }
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();
        let mut step: u64 = 0;

        info!("Traffic generator started: {} base size every {:?}", self.trade_size, self.period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trade_once(step).await;
                    step += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Traffic generator stopped after {} trades", step);
    }
}
