//! Keeper Scheduler
//!
//! Two periodic triggers on one `select!` loop:
//! - compound: fold accrued fees back into the reserves once they are worth it
//! - rebalance: trade float through the pool when the price has drifted more
//!   than the threshold from its target
//!
//! A failed cycle is logged and the loop carries on. Losing the operator role
//! is the one failure that stops the keeper.

use crate::config::KeeperConfig;
use crate::keeper::error::SubmitError;
use crate::keeper::gateway::{KeeperAction, PoolGateway};
use crate::keeper::history::{ActionHistory, ActionRecord, ActionStatus, KeeperStatus};
use crate::keeper::submitter::{SubmitOutcome, Submitter};
use crate::pool::PriceCalculator;
use crate::types::{
    decimal_to_price, decimal_to_units, price_to_decimal, Direction, PoolView, PRICE_DECIMALS,
    PRICE_SCALE,
};
use alloy::primitives::U256;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What a single trigger firing did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Confirmed { tx_ref: String },
    Skipped(&'static str),
    Deferred,
    Failed,
    Cancelled,
}

/// Mutable keeper bookkeeping shared with status readers
#[derive(Debug)]
struct KeeperState {
    history: ActionHistory,
    target_price: Option<U256>,
    last_price: Option<U256>,
    halted: bool,
}

pub struct KeeperScheduler {
    gateway: Arc<dyn PoolGateway>,
    submitter: Submitter,
    config: KeeperConfig,
    min_compound_fee: U256,
    min_rebalance_amount: U256,
    /// `max_rebalance_fraction` as 18-decimal fixed point
    max_rebalance_fraction: U256,
    state: Arc<RwLock<KeeperState>>,
    started_at: DateTime<Utc>,
    shutdown: watch::Receiver<bool>,
}

impl KeeperScheduler {
    pub fn new(
        gateway: Arc<dyn PoolGateway>,
        config: KeeperConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let schedule = &config.keeper;
        let min_compound_fee = schedule.min_compound_fee_units()?;
        let min_rebalance_amount = schedule.min_rebalance_amount_units()?;
        let max_rebalance_fraction =
            decimal_to_units(schedule.max_rebalance_fraction, PRICE_DECIMALS)
                .context("max_rebalance_fraction out of range")?;
        let target_price = match schedule.target_price {
            Some(target) => Some(decimal_to_price(target).context("target_price out of range")?),
            None => None,
        };

        let submitter =
            Submitter::new(gateway.clone(), config.transactions.clone(), shutdown.clone());
        let state = KeeperState {
            history: ActionHistory::new(schedule.history_size),
            target_price,
            last_price: None,
            halted: false,
        };

        Ok(Self {
            gateway,
            submitter,
            min_compound_fee,
            min_rebalance_amount,
            max_rebalance_fraction,
            state: Arc::new(RwLock::new(state)),
            started_at: Utc::now(),
            shutdown,
            config,
        })
    }

    /// Run both triggers until shutdown, or until the operator role is lost
    pub async fn run(&self) -> Result<()> {
        let mut compound_timer = interval(self.config.keeper.compound_interval());
        let mut rebalance_timer = interval(self.config.keeper.rebalance_interval());
        compound_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        rebalance_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        info!(
            "Keeper started: operator={} compound every {:?}, rebalance every {:?} (threshold {})",
            self.gateway.operator(),
            self.config.keeper.compound_interval(),
            self.config.keeper.rebalance_interval(),
            self.config.keeper.rebalance_threshold
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = compound_timer.tick() => {
                    self.run_compound_cycle().await?;
                }
                _ = rebalance_timer.tick() => {
                    self.run_rebalance_cycle().await?;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Keeper stopped");
        Ok(())
    }

    /// One compound trigger: skip while both fee buckets are below the minimum
    pub async fn run_compound_cycle(&self) -> Result<CycleOutcome> {
        let view = match self.gateway.snapshot().await {
            Ok(view) => view,
            Err(e) => {
                warn!("Compound: failed to read pool state: {:#}", e);
                return Ok(CycleOutcome::Failed);
            }
        };
        self.observe_price(&view).await;

        if view.fee_a < self.min_compound_fee && view.fee_b < self.min_compound_fee {
            debug!(
                "Compound skipped: fees ({}, {}) below minimum {}",
                view.fee_a, view.fee_b, self.min_compound_fee
            );
            self.state.write().await.history.record_skip();
            return Ok(CycleOutcome::Skipped("fees below minimum"));
        }

        info!("Compounding fees: fee_a={} fee_b={}", view.fee_a, view.fee_b);
        self.execute(KeeperAction::CompoundFees, view.fee_a, view.fee_b).await
    }

    /// One rebalance trigger: correct drift beyond the threshold, bounded by
    /// the per-trade cap and the available float
    pub async fn run_rebalance_cycle(&self) -> Result<CycleOutcome> {
        let view = match self.gateway.snapshot().await {
            Ok(view) => view,
            Err(e) => {
                warn!("Rebalance: failed to read pool state: {:#}", e);
                return Ok(CycleOutcome::Failed);
            }
        };
        let Some(price) = view.price() else {
            debug!("Rebalance skipped: pool is empty");
            self.state.write().await.history.record_skip();
            return Ok(CycleOutcome::Skipped("pool is empty"));
        };
        let target = self.observe_price(&view).await.unwrap_or(price);

        let deviation = match relative_deviation(price, target) {
            Some(deviation) => deviation,
            None => {
                warn!("Rebalance skipped: price {} or target {} not representable", price, target);
                self.state.write().await.history.record_skip();
                return Ok(CycleOutcome::Skipped("price not representable"));
            }
        };
        if deviation <= self.config.keeper.rebalance_threshold {
            debug!(
                "Rebalance skipped: deviation {} within threshold {}",
                deviation.round_dp(6),
                self.config.keeper.rebalance_threshold
            );
            self.state.write().await.history.record_skip();
            return Ok(CycleOutcome::Skipped("within threshold"));
        }

        let Some((direction, amount_in)) = self.size_rebalance(&view, target) else {
            self.state.write().await.history.record_skip();
            return Ok(CycleOutcome::Skipped("below minimum rebalance amount"));
        };

        info!(
            "Rebalancing {}: price={} target={} deviation={} amount_in={}",
            direction,
            price,
            target,
            deviation.round_dp(6),
            amount_in
        );
        let (amount_a, amount_b) = match direction {
            Direction::AToB => (amount_in, U256::ZERO),
            Direction::BToA => (U256::ZERO, amount_in),
        };
        self.execute(KeeperAction::Rebalance { amount_in, direction }, amount_a, amount_b)
            .await
    }

    /// Input for a rebalance toward `target`, or None if it would be dust
    fn size_rebalance(&self, view: &PoolView, target: U256) -> Option<(Direction, U256)> {
        let (direction, ideal) =
            match PriceCalculator::correcting_amount_in(view.reserve_a, view.reserve_b, target) {
                Ok(Some(sizing)) => sizing,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Rebalance sizing failed: {}", e);
                    return None;
                }
            };

        let (reserve_in, _) = view.reserves_for(direction);
        let cap = reserve_in
            .checked_mul(self.max_rebalance_fraction)
            .map(|scaled| scaled / PRICE_SCALE)
            .unwrap_or_else(|| reserve_in / PRICE_SCALE * self.max_rebalance_fraction);
        let float = view.float_of(direction.token_in());
        let amount_in = ideal.min(cap).min(float);

        if amount_in < self.min_rebalance_amount {
            if float < self.min_rebalance_amount {
                warn!(
                    "Rebalance skipped: float of token {} exhausted ({})",
                    direction.token_in(),
                    float
                );
            } else {
                debug!(
                    "Rebalance skipped: amount {} below minimum {}",
                    amount_in, self.min_rebalance_amount
                );
            }
            return None;
        }
        Some((direction, amount_in))
    }

    /// Submit through the gate and record the result
    async fn execute(
        &self,
        action: KeeperAction,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<CycleOutcome> {
        let direction = match action {
            KeeperAction::Rebalance { direction, .. } => Some(direction),
            KeeperAction::CompoundFees => None,
        };
        let mut record = ActionRecord {
            timestamp: Utc::now(),
            kind: action.kind(),
            amount_a,
            amount_b,
            direction,
            tx_ref: None,
            status: ActionStatus::Success,
            gas_used: None,
            error: None,
        };

        match self.submitter.submit(&action).await {
            Ok(SubmitOutcome::Confirmed(receipt)) => {
                info!(
                    "{} confirmed: tx={} gas_used={}",
                    action.kind(),
                    receipt.tx_ref,
                    receipt.gas_used
                );
                record.tx_ref = Some(receipt.tx_ref.clone());
                record.gas_used = Some(receipt.gas_used);
                self.state.write().await.history.record(record);
                Ok(CycleOutcome::Confirmed { tx_ref: receipt.tx_ref })
            }
            Ok(SubmitOutcome::Deferred { .. }) => {
                self.state.write().await.history.record_deferral();
                Ok(CycleOutcome::Deferred)
            }
            Ok(SubmitOutcome::Cancelled) => Ok(CycleOutcome::Cancelled),
            Err(err) => self.record_failure(record, err).await,
        }
    }

    async fn record_failure(
        &self,
        mut record: ActionRecord,
        err: SubmitError,
    ) -> Result<CycleOutcome> {
        record.status = ActionStatus::Failed;
        record.error = Some(err.to_string());
        match &err {
            SubmitError::Reverted { tx_ref }
            | SubmitError::Unconfirmed { tx_ref: Some(tx_ref), .. } => {
                record.tx_ref = Some(tx_ref.clone());
            }
            _ => {}
        }
        let kind = record.kind;

        let mut state = self.state.write().await;
        state.history.record(record);
        if err.is_fatal() {
            state.halted = true;
            error!("{} rejected: {}. Operator role lost, halting keeper", kind, err);
            return Err(anyhow!(err).context("keeper halted: not authorized as pool operator"));
        }
        error!("{} cycle failed: {}", kind, err);
        Ok(CycleOutcome::Failed)
    }

    /// Record the latest price, pinning the target on first sight if unset
    async fn observe_price(&self, view: &PoolView) -> Option<U256> {
        let price = view.price();
        let mut state = self.state.write().await;
        state.last_price = price;
        if state.target_price.is_none() {
            if let Some(price) = price {
                info!("Target price pinned to first observed price {}", price);
                state.target_price = Some(price);
            }
        }
        state.target_price
    }

    pub async fn target_price(&self) -> Option<U256> {
        self.state.read().await.target_price
    }

    pub async fn status(&self) -> KeeperStatus {
        let state = self.state.read().await;
        KeeperStatus {
            started_at: self.started_at,
            operator: self.gateway.operator(),
            halted: state.halted,
            target_price: state.target_price.and_then(price_to_decimal),
            last_price: state.last_price.and_then(price_to_decimal),
            counts: state.history.counts().clone(),
            recent_actions: state.history.recent(),
            config: self.config.clone(),
        }
    }
}

/// |price - target| / target
fn relative_deviation(price: U256, target: U256) -> Option<Decimal> {
    let price = price_to_decimal(price)?;
    let target = price_to_decimal(target)?;
    if target.is_zero() {
        return None;
    }
    (price - target).abs().checked_div(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::gateway::LocalGateway;
    use crate::pool::Pool;
    use crate::types::Token;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;

    fn operator() -> Address {
        Address::repeat_byte(0x0b)
    }

    fn ether(n: u64) -> U256 {
        U256::from(n) * PRICE_SCALE
    }

    fn milli(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000_000_000u64)
    }

    fn local(reserve_a: u64, reserve_b: u64, float: u64) -> Arc<LocalGateway> {
        let mut pool = Pool::new(operator());
        pool.add_liquidity(operator(), ether(reserve_a), ether(reserve_b)).unwrap();
        if float > 0 {
            pool.fund_float(operator(), Token::A, ether(float)).unwrap();
            pool.fund_float(operator(), Token::B, ether(float)).unwrap();
        }
        pool.take_events();
        Arc::new(LocalGateway::new(Arc::new(RwLock::new(pool)), operator(), 30))
    }

    fn scheduler(gateway: Arc<LocalGateway>, config: KeeperConfig) -> KeeperScheduler {
        let (_tx, rx) = watch::channel(false);
        KeeperScheduler::new(gateway, config, rx).unwrap()
    }

    fn config_with_target(target: Decimal) -> KeeperConfig {
        let mut config = KeeperConfig::default();
        config.keeper.target_price = Some(target);
        config
    }

    #[test]
    fn test_relative_deviation() {
        assert_eq!(relative_deviation(ether(1), ether(1)), Some(Decimal::ZERO));
        assert_eq!(
            relative_deviation(ether(6) / U256::from(5u64), ether(1)),
            Some(dec!(0.2))
        );
        assert_eq!(relative_deviation(ether(1), U256::ZERO), None);
    }

    #[tokio::test]
    async fn test_compound_skipped_below_minimum() {
        let gateway = local(10_000, 10_000, 0);
        {
            // 0.1 A in -> 0.0003 A fee, under the 0.001 minimum
            let pool = gateway.pool();
            let mut pool = pool.write().await;
            pool.swap(Address::repeat_byte(2), milli(100), Direction::AToB).unwrap();
        }
        let keeper = scheduler(gateway.clone(), KeeperConfig::default());

        let outcome = keeper.run_compound_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped("fees below minimum"));
        let (fee_a, _) = gateway.pool().read().await.get_fees();
        assert_eq!(fee_a, U256::from(300_000_000_000_000u64));
        assert_eq!(keeper.status().await.counts.skips, 1);
    }

    #[tokio::test]
    async fn test_compound_cycle_submits() {
        let gateway = local(10_000, 10_000, 0);
        gateway
            .pool()
            .write()
            .await
            .swap(Address::repeat_byte(2), ether(100), Direction::AToB)
            .unwrap();
        let keeper = scheduler(gateway.clone(), KeeperConfig::default());

        let outcome = keeper.run_compound_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Confirmed { .. }));

        let pool = gateway.pool();
        let pool = pool.read().await;
        assert_eq!(pool.get_fees(), (U256::ZERO, U256::ZERO));

        let status = keeper.status().await;
        assert_eq!(status.counts.compounds, 1);
        let record = &status.recent_actions[0];
        assert_eq!(record.amount_a, milli(300));
        assert_eq!(record.status, ActionStatus::Success);
        assert!(record.tx_ref.is_some());
    }

    #[tokio::test]
    async fn test_rebalance_within_threshold_skips() {
        // price 1.04 against 1.0
        let gateway = local(10_000, 10_400, 100);
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));
        let before = gateway.snapshot().await.unwrap();

        let outcome = keeper.run_rebalance_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped("within threshold"));
        assert_eq!(gateway.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_rebalance_moves_toward_target() {
        // price 1.2 against 1.0: A goes in
        let gateway = local(10_000, 12_000, 100);
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));
        let before = gateway.snapshot().await.unwrap();

        let outcome = keeper.run_rebalance_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Confirmed { .. }));

        let after = gateway.snapshot().await.unwrap();
        assert!(after.price().unwrap() < before.price().unwrap());
        assert!(after.price().unwrap() > ether(1));

        // Capped at 0.5% of the input reserve
        let record = &keeper.status().await.recent_actions[0];
        assert_eq!(record.direction, Some(Direction::AToB));
        assert_eq!(record.amount_a, ether(50));
        assert_eq!(after.float_a, ether(50));
    }

    #[tokio::test]
    async fn test_rebalance_below_target_sends_b() {
        let gateway = local(12_000, 10_000, 100);
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));

        keeper.run_rebalance_cycle().await.unwrap();
        let record = &keeper.status().await.recent_actions[0];
        assert_eq!(record.direction, Some(Direction::BToA));
        assert_eq!(record.amount_b, ether(50));
    }

    #[tokio::test]
    async fn test_rebalance_bounded_by_float() {
        let gateway = local(10_000, 12_000, 0);
        gateway
            .pool()
            .write()
            .await
            .fund_float(operator(), Token::A, ether(3))
            .unwrap();
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));

        keeper.run_rebalance_cycle().await.unwrap();
        let record = &keeper.status().await.recent_actions[0];
        assert_eq!(record.amount_a, ether(3));
        assert_eq!(gateway.snapshot().await.unwrap().float_a, U256::ZERO);
    }

    #[tokio::test]
    async fn test_rebalance_without_float_skips() {
        let gateway = local(10_000, 12_000, 0);
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));

        let outcome = keeper.run_rebalance_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped("below minimum rebalance amount"));
    }

    #[tokio::test]
    async fn test_target_pinned_to_first_price() {
        let gateway = local(10_000, 12_000, 100);
        let keeper = scheduler(gateway.clone(), KeeperConfig::default());

        let outcome = keeper.run_rebalance_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped("within threshold"));
        assert_eq!(keeper.target_price().await, Some(ether(12) / U256::from(10u64)));
    }

    #[tokio::test]
    async fn test_gas_ceiling_defers_cycle() {
        let gateway = local(10_000, 12_000, 100);
        gateway.set_gas_price_gwei(500);
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));
        let before = gateway.snapshot().await.unwrap();

        let outcome = keeper.run_rebalance_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Deferred);
        assert_eq!(gateway.snapshot().await.unwrap(), before);

        let status = keeper.status().await;
        assert_eq!(status.counts.deferrals, 1);
        assert_eq!(status.counts.failures, 0);
    }

    #[tokio::test]
    async fn test_lost_operator_role_halts() {
        let gateway = local(10_000, 12_000, 100);
        gateway
            .pool()
            .write()
            .await
            .set_operator(operator(), Address::repeat_byte(0x0c))
            .unwrap();
        let keeper = scheduler(gateway.clone(), config_with_target(dec!(1)));

        assert!(keeper.run_rebalance_cycle().await.is_err());
        let status = keeper.status().await;
        assert!(status.halted);
        assert_eq!(status.recent_actions[0].status, ActionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let gateway = local(10_000, 10_000, 0);
        let (tx, rx) = watch::channel(false);
        let keeper = Arc::new(KeeperScheduler::new(gateway, KeeperConfig::default(), rx).unwrap());

        let handle = {
            let keeper = keeper.clone();
            tokio::spawn(async move { keeper.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        // Both triggers fire immediately, rebalance once more after 60s
        let counts = keeper.status().await.counts;
        assert!(counts.skips >= 3);
    }
}
