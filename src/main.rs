//! Mini-AMM Keeper
//!
//! Runs the compound/rebalance keeper against either a deployed MiniAMM
//! contract (default) or an in-process pool seeded from the `[local]` config
//! section (`--local`), until SIGINT or SIGTERM.

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use mini_amm_keeper::config::KeeperConfig;
use mini_amm_keeper::keeper::{
    ChainGateway, KeeperScheduler, LocalGateway, PoolGateway, TrafficGenerator,
};
use mini_amm_keeper::pool::Pool;
use mini_amm_keeper::types::{decimal_to_units, Token};
use rust_decimal::Decimal;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Liquidity provider and trader identities for local mode
const LOCAL_LP_BYTE: u8 = 0x1a;
const LOCAL_TRADER_BYTE: u8 = 0x7a;

/// Mini-AMM keeper: compounds fees and keeps the pool near its target price
#[derive(Parser)]
#[command(name = "amm-keeper")]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Run against an in-process pool instead of a deployed contract
    #[arg(long)]
    local: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = KeeperConfig::load(args.config.as_deref())?;
    match &args.config {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file given, using defaults and environment"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    tokio::spawn(async move {
        if let Some(sig) = signals.next().await {
            info!("Received signal {}, shutting down", sig);
            let _ = shutdown_tx.send(true);
        }
    });

    let gateway: Arc<dyn PoolGateway> = if args.local {
        let gateway = local_gateway(&config)?;
        spawn_traffic(&config, &gateway, shutdown_rx.clone())?;
        Arc::new(gateway)
    } else {
        Arc::new(ChainGateway::connect(&config).await?)
    };

    let keeper = KeeperScheduler::new(gateway, config, shutdown_rx)?;
    let result = keeper.run().await;

    let status = keeper.status().await;
    match serde_json::to_string_pretty(&status) {
        Ok(json) => info!("Final keeper status:\n{}", json),
        Err(e) => error!("Failed to serialize keeper status: {}", e),
    }
    signals_handle.close();

    if let Err(e) = &result {
        error!("Keeper exited with error: {:#}", e);
    }
    result
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn units(amount: Decimal, decimals: u32, field: &str) -> Result<U256> {
    decimal_to_units(amount, decimals)
        .with_context(|| format!("[local].{} = {} is out of range", field, amount))
}

/// Seed an in-process pool from `[local]`
fn local_gateway(config: &KeeperConfig) -> Result<LocalGateway> {
    let local = &config.local;
    let decimals = config.keeper.token_decimals;
    let mut pool = Pool::new(local.operator);
    pool.add_liquidity(
        Address::repeat_byte(LOCAL_LP_BYTE),
        units(local.initial_liquidity_a, decimals, "initial_liquidity_a")?,
        units(local.initial_liquidity_b, decimals, "initial_liquidity_b")?,
    )
    .context("Failed to seed local pool")?;

    let float_a = units(local.float_a, decimals, "float_a")?;
    let float_b = units(local.float_b, decimals, "float_b")?;
    if !float_a.is_zero() {
        pool.fund_float(local.operator, Token::A, float_a)?;
    }
    if !float_b.is_zero() {
        pool.fund_float(local.operator, Token::B, float_b)?;
    }
    pool.take_events();

    let view = pool.view();
    info!(
        "Local pool seeded: reserves=({}, {}) float=({}, {}) operator={}",
        view.reserve_a, view.reserve_b, view.float_a, view.float_b, local.operator
    );
    Ok(LocalGateway::new(
        Arc::new(RwLock::new(pool)),
        local.operator,
        local.gas_price_gwei,
    ))
}

fn spawn_traffic(
    config: &KeeperConfig,
    gateway: &LocalGateway,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let local = &config.local;
    if local.trade_interval_ms == 0 {
        info!("Traffic generator disabled");
        return Ok(());
    }
    let traffic = TrafficGenerator::new(
        gateway.pool(),
        Address::repeat_byte(LOCAL_TRADER_BYTE),
        units(local.trade_size, config.keeper.token_decimals, "trade_size")?,
        Duration::from_millis(local.trade_interval_ms),
        shutdown,
    );
    tokio::spawn(traffic.run());
    Ok(())
}
