//! Configuration management
//!
//! Settings come from an optional TOML file, then environment variables
//! (loaded from `.env` via dotenv) override the network and gas fields.
//! The operator private key is only ever read from the environment.

use crate::types::decimal_to_units;
use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level keeper configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeeperConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub keeper: ScheduleConfig,
    #[serde(default)]
    pub transactions: TxConfig,
    #[serde(default)]
    pub local: LocalConfig,
    /// Operator credential, never serialized
    #[serde(skip)]
    pub private_key: Option<String>,
}

/// Chain connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    pub contract_address: Option<Address>,
}

fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
fn default_chain_id() -> u64 { 31337 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            contract_address: None,
        }
    }
}

/// Trigger cadence and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_compound_interval")]
    pub compound_interval_secs: u64,
    #[serde(default = "default_rebalance_interval")]
    pub rebalance_interval_secs: u64,
    /// Relative deviation from target that triggers a rebalance (0.05 = 5%)
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Decimal,
    /// Fixed target price; the first observed pool price when unset
    pub target_price: Option<Decimal>,
    /// Token amounts below are in whole tokens (scaled by `token_decimals`)
    #[serde(default = "default_min_amount")]
    pub min_compound_fee: Decimal,
    #[serde(default = "default_max_rebalance_fraction")]
    pub max_rebalance_fraction: Decimal,
    #[serde(default = "default_min_amount")]
    pub min_rebalance_amount: Decimal,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_compound_interval() -> u64 { 300 }
fn default_rebalance_interval() -> u64 { 60 }
fn default_rebalance_threshold() -> Decimal { Decimal::new(5, 2) }
fn default_min_amount() -> Decimal { Decimal::new(1, 3) }
fn default_max_rebalance_fraction() -> Decimal { Decimal::new(5, 3) }
fn default_token_decimals() -> u32 { 18 }
fn default_history_size() -> usize { 100 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            compound_interval_secs: default_compound_interval(),
            rebalance_interval_secs: default_rebalance_interval(),
            rebalance_threshold: default_rebalance_threshold(),
            target_price: None,
            min_compound_fee: default_min_amount(),
            max_rebalance_fraction: default_max_rebalance_fraction(),
            min_rebalance_amount: default_min_amount(),
            token_decimals: default_token_decimals(),
            history_size: default_history_size(),
        }
    }
}

impl ScheduleConfig {
    pub fn compound_interval(&self) -> Duration {
        Duration::from_secs(self.compound_interval_secs)
    }

    pub fn rebalance_interval(&self) -> Duration {
        Duration::from_secs(self.rebalance_interval_secs)
    }

    pub fn min_compound_fee_units(&self) -> Result<U256> {
        to_units(self.min_compound_fee, self.token_decimals, "min_compound_fee")
    }

    pub fn min_rebalance_amount_units(&self) -> Result<U256> {
        to_units(self.min_rebalance_amount, self.token_decimals, "min_rebalance_amount")
    }
}

/// Transaction submission policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxConfig {
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

fn default_gas_limit() -> u64 { 300_000 }
fn default_max_gas_price() -> u64 { 100 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 5 }
fn default_confirmation_timeout() -> u64 { 60 }

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
            max_gas_price_gwei: default_max_gas_price(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl TxConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Gas price ceiling in wei
    pub fn max_gas_price_wei(&self) -> u128 {
        self.max_gas_price_gwei as u128 * 1_000_000_000
    }
}

/// In-process pool used by `--local`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_operator")]
    pub operator: Address,
    #[serde(default = "default_local_liquidity")]
    pub initial_liquidity_a: Decimal,
    #[serde(default = "default_local_liquidity")]
    pub initial_liquidity_b: Decimal,
    #[serde(default = "default_local_float")]
    pub float_a: Decimal,
    #[serde(default = "default_local_float")]
    pub float_b: Decimal,
    /// Organic trade cadence; zero disables the generator
    #[serde(default = "default_trade_interval")]
    pub trade_interval_ms: u64,
    #[serde(default = "default_trade_size")]
    pub trade_size: Decimal,
    #[serde(default = "default_local_gas_price")]
    pub gas_price_gwei: u64,
}

fn default_local_operator() -> Address { Address::repeat_byte(0x0b) }
fn default_local_liquidity() -> Decimal { Decimal::from(10_000) }
fn default_local_float() -> Decimal { Decimal::from(1_000) }
fn default_trade_interval() -> u64 { 2_000 }
fn default_trade_size() -> Decimal { Decimal::from(50) }
fn default_local_gas_price() -> u64 { 30 }

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            operator: default_local_operator(),
            initial_liquidity_a: default_local_liquidity(),
            initial_liquidity_b: default_local_liquidity(),
            float_a: default_local_float(),
            float_b: default_local_float(),
            trade_interval_ms: default_trade_interval(),
            trade_size: default_trade_size(),
            gas_price_gwei: default_local_gas_price(),
        }
    }
}

fn to_units(amount: Decimal, decimals: u32, field: &str) -> Result<U256> {
    decimal_to_units(amount, decimals)
        .with_context(|| format!("{} = {} is not a representable token amount", field, amount))
}

impl KeeperConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("RPC_URL") {
            self.network.rpc_url = url;
        }
        if let Ok(address) = std::env::var("CONTRACT_ADDRESS") {
            let address = Address::from_str(address.trim())
                .context("CONTRACT_ADDRESS is not a valid address")?;
            self.network.contract_address = Some(address);
        }
        if let Ok(chain_id) = std::env::var("CHAIN_ID") {
            self.network.chain_id = chain_id.trim().parse().context("CHAIN_ID must be an integer")?;
        }
        if let Ok(gwei) = std::env::var("MAX_GAS_PRICE_GWEI") {
            self.transactions.max_gas_price_gwei =
                gwei.trim().parse().context("MAX_GAS_PRICE_GWEI must be an integer")?;
        }
        if let Ok(key) = std::env::var("PRIVATE_KEY") {
            if !key.trim().is_empty() {
                self.private_key = Some(key.trim().to_string());
            }
        }
        Ok(())
    }

    /// Reject settings the keeper cannot run with
    pub fn validate(&self) -> Result<()> {
        let keeper = &self.keeper;
        if keeper.compound_interval_secs == 0 || keeper.rebalance_interval_secs == 0 {
            bail!("trigger intervals must be at least one second");
        }
        if keeper.rebalance_threshold <= Decimal::ZERO {
            bail!("rebalance_threshold must be positive");
        }
        let fraction = keeper.max_rebalance_fraction;
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            bail!("max_rebalance_fraction must be in (0, 1]");
        }
        if let Some(target) = keeper.target_price {
            if target <= Decimal::ZERO {
                bail!("target_price must be positive");
            }
        }
        if keeper.history_size == 0 {
            bail!("history_size must be at least 1");
        }
        keeper.min_compound_fee_units()?;
        keeper.min_rebalance_amount_units()?;
        if self.transactions.gas_limit == 0 {
            bail!("gas_limit must be positive");
        }
        if self.transactions.confirmation_timeout_secs == 0 {
            bail!("confirmation_timeout_secs must be positive");
        }
        Ok(())
    }

    /// The operator key, required in chain mode
    pub fn require_private_key(&self) -> Result<&str> {
        self.private_key
            .as_deref()
            .context("PRIVATE_KEY not set (required outside --local mode)")
    }

    pub fn require_contract_address(&self) -> Result<Address> {
        self.network
            .contract_address
            .context("contract address not set (CONTRACT_ADDRESS or [network].contract_address)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = KeeperConfig::from_toml("").unwrap();
        assert_eq!(config.keeper.compound_interval(), Duration::from_secs(300));
        assert_eq!(config.keeper.rebalance_interval(), Duration::from_secs(60));
        assert_eq!(config.keeper.rebalance_threshold, dec!(0.05));
        assert_eq!(config.keeper.max_rebalance_fraction, dec!(0.005));
        assert_eq!(
            config.keeper.min_compound_fee_units().unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
        assert_eq!(config.transactions.gas_limit, 300_000);
        assert_eq!(config.transactions.retry_attempts, 3);
        assert_eq!(config.transactions.max_gas_price_wei(), 100_000_000_000);
        assert_eq!(config.network.chain_id, 31337);
        assert!(config.private_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_sections() {
        let config = KeeperConfig::from_toml(
            r#"
            [network]
            rpc_url = "http://node:8545"
            contract_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"

            [keeper]
            rebalance_interval_secs = 15
            rebalance_threshold = 0.02
            target_price = 1.5

            [transactions]
            retry_attempts = 1

            [local]
            trade_interval_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.network.rpc_url, "http://node:8545");
        assert!(config.network.contract_address.is_some());
        assert_eq!(config.keeper.rebalance_interval_secs, 15);
        assert_eq!(config.keeper.rebalance_threshold, dec!(0.02));
        assert_eq!(config.keeper.target_price, Some(dec!(1.5)));
        assert_eq!(config.keeper.compound_interval_secs, 300);
        assert_eq!(config.transactions.retry_attempts, 1);
        assert_eq!(config.local.trade_interval_ms, 0);
    }

    #[test]
    fn test_validation() {
        let mut config = KeeperConfig::default();
        config.keeper.rebalance_threshold = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = KeeperConfig::default();
        config.keeper.max_rebalance_fraction = dec!(1.5);
        assert!(config.validate().is_err());

        let mut config = KeeperConfig::default();
        config.keeper.target_price = Some(dec!(-1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_private_key_not_serialized() {
        let mut config = KeeperConfig::default();
        config.private_key = Some("0xdeadbeef".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(config.require_private_key().is_ok());
        assert!(KeeperConfig::default().require_private_key().is_err());
    }
}
