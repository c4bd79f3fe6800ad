//! Keeper driving an in-process pool with organic traffic

use alloy::primitives::{Address, U256};
use mini_amm_keeper::keeper::{
    CycleOutcome, KeeperScheduler, LocalGateway, PoolGateway, TrafficGenerator,
};
use mini_amm_keeper::{Direction, KeeperConfig, Pool, Token};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

const ONE: u64 = 1_000_000_000_000_000_000;

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE)
}

fn operator() -> Address {
    Address::repeat_byte(0x0b)
}

fn seeded_gateway() -> Arc<LocalGateway> {
    let mut pool = Pool::new(operator());
    pool.add_liquidity(Address::repeat_byte(0x1a), ether(10_000), ether(10_000))
        .unwrap();
    pool.fund_float(operator(), Token::A, ether(500)).unwrap();
    pool.fund_float(operator(), Token::B, ether(500)).unwrap();
    pool.take_events();
    Arc::new(LocalGateway::new(Arc::new(RwLock::new(pool)), operator(), 20))
}

#[tokio::test]
async fn test_keeper_compounds_traffic_fees() {
    let gateway = seeded_gateway();
    let (_tx, rx) = watch::channel(false);
    let traffic = TrafficGenerator::new(
        gateway.pool(),
        Address::repeat_byte(0x7a),
        ether(20),
        Duration::from_secs(1),
        rx.clone(),
    );
    for step in 0..10 {
        traffic.trade_once(step).await;
    }

    let keeper = KeeperScheduler::new(gateway.clone(), KeeperConfig::default(), rx).unwrap();
    let outcome = keeper.run_compound_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Confirmed { .. }));

    let view = gateway.snapshot().await.unwrap();
    assert_eq!((view.fee_a, view.fee_b), (U256::ZERO, U256::ZERO));
    let pool = gateway.pool();
    assert!(pool.read().await.balance_of(&operator()) > U256::ZERO);
}

#[tokio::test]
async fn test_keeper_corrects_drift_over_cycles() {
    let gateway = seeded_gateway();
    // Heavy one-sided selling pushes the price of A down ~10%
    gateway
        .pool()
        .write()
        .await
        .swap(Address::repeat_byte(0x7a), ether(500), Direction::AToB)
        .unwrap();

    let mut config = KeeperConfig::default();
    config.keeper.target_price = Some(dec!(1));
    let (_tx, rx) = watch::channel(false);
    let keeper = KeeperScheduler::new(gateway.clone(), config, rx).unwrap();

    let mut confirmed = 0;
    for _ in 0..20 {
        match keeper.run_rebalance_cycle().await.unwrap() {
            CycleOutcome::Confirmed { .. } => confirmed += 1,
            CycleOutcome::Skipped("within threshold") => break,
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert!(confirmed > 0);

    // Ends inside the band without overshooting the target
    let price = gateway.snapshot().await.unwrap().price().unwrap();
    assert!(price < U256::from(ONE));
    assert!(price >= U256::from(950_000_000_000_000_000u64));

    let status = keeper.status().await;
    assert_eq!(status.counts.rebalances, confirmed);
    assert!(status
        .recent_actions
        .iter()
        .all(|a| a.direction == Some(Direction::BToA)));
}
