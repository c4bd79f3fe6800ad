//! End-to-end ledger scenarios through the public API

use alloy::primitives::{Address, U256};
use mini_amm_keeper::{Direction, LedgerError, Pool, PoolEvent, Token};

const ONE: u64 = 1_000_000_000_000_000_000;

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE)
}

fn operator() -> Address {
    Address::repeat_byte(0x0b)
}

fn lp() -> Address {
    Address::repeat_byte(0x1a)
}

fn trader() -> Address {
    Address::repeat_byte(0x7a)
}

fn distance(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[test]
fn test_full_lifecycle() {
    let mut pool = Pool::new(operator());

    // Seed at 1:1
    let shares = pool.add_liquidity(lp(), ether(10_000), ether(10_000)).unwrap();
    assert_eq!(shares, ether(10_000));
    assert_eq!(pool.get_price().unwrap(), U256::from(ONE));

    // Swap 100 A: fee bucket takes 0.3 A, output matches the quote
    let quoted = pool.get_amount_out(ether(100), Direction::AToB).unwrap();
    let product_before = {
        let (a, b) = pool.get_reserves();
        a * b
    };
    let out = pool.swap(trader(), ether(100), Direction::AToB).unwrap();
    assert_eq!(out, quoted);
    assert_eq!(pool.get_fees(), (U256::from(300_000_000_000_000_000u64), U256::ZERO));
    let (reserve_a, reserve_b) = pool.get_reserves();
    assert!(reserve_a * reserve_b >= product_before);

    // Compound folds the fee into reserve A and pays the operator
    let minted = pool.compound_fees(operator()).unwrap();
    assert!(minted > U256::ZERO);
    assert_eq!(pool.get_fees(), (U256::ZERO, U256::ZERO));
    assert_eq!(pool.get_reserves().0, reserve_a + U256::from(300_000_000_000_000_000u64));
    assert_eq!(pool.balance_of(&operator()), minted);

    // Non-operator rebalance is refused
    pool.fund_float(operator(), Token::B, ether(100)).unwrap();
    assert_eq!(
        pool.rebalance(trader(), ether(10), Direction::BToA),
        Err(LedgerError::Unauthorized { caller: trader() })
    );

    // Operator rebalance pulls the price back toward 1.0
    let before = distance(pool.get_price().unwrap(), U256::from(ONE));
    pool.rebalance(operator(), ether(50), Direction::BToA).unwrap();
    let after = distance(pool.get_price().unwrap(), U256::from(ONE));
    assert!(after < before);

    let names: Vec<&str> = pool.take_events().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec!["Mint", "Swap", "FeeCollected", "FloatFunded", "Rebalance"]
    );

    // Everyone can exit; supply always matches the sum of balances
    let lp_shares = pool.balance_of(&lp());
    let op_shares = pool.balance_of(&operator());
    assert_eq!(lp_shares + op_shares, pool.total_supply());
    pool.remove_liquidity(lp(), lp_shares).unwrap();
    pool.remove_liquidity(operator(), op_shares).unwrap();
    assert_eq!(pool.total_supply(), U256::ZERO);
    assert!(pool.is_empty());
}

#[test]
fn test_failed_operations_leave_state_untouched() {
    let mut pool = Pool::new(operator());
    pool.add_liquidity(lp(), ether(1_000), ether(1_000)).unwrap();
    pool.take_events();
    let before = pool.view();

    assert!(pool.swap(trader(), U256::ZERO, Direction::AToB).is_err());
    assert!(pool.add_liquidity(lp(), ether(1), U256::ZERO).is_err());
    assert!(pool.remove_liquidity(trader(), ether(1)).is_err());
    assert!(pool.compound_fees(trader()).is_err());
    assert!(pool.rebalance(operator(), ether(1), Direction::AToB).is_err());
    assert!(pool.set_operator(trader(), trader()).is_err());

    assert_eq!(pool.view(), before);
    assert!(pool.take_events().is_empty());
}

#[test]
fn test_empty_pool_reads() {
    let pool = Pool::new(operator());
    assert_eq!(pool.get_price(), Err(LedgerError::EmptyPool));
    assert_eq!(
        pool.get_amount_out(ether(1), Direction::BToA),
        Err(LedgerError::EmptyPool)
    );
    assert_eq!(pool.get_reserves(), (U256::ZERO, U256::ZERO));
}

#[test]
fn test_operator_handoff() {
    let mut pool = Pool::new(operator());
    pool.add_liquidity(lp(), ether(1_000), ether(1_000)).unwrap();
    pool.swap(trader(), ether(10), Direction::AToB).unwrap();
    pool.set_operator(operator(), trader()).unwrap();

    assert!(pool.compound_fees(operator()).is_err());
    let minted = pool.compound_fees(trader()).unwrap();
    assert_eq!(pool.balance_of(&trader()), minted);
    assert!(pool
        .take_events()
        .iter()
        .any(|e| matches!(e, PoolEvent::OperatorUpdated { .. })));
}
