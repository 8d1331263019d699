//! Resolver Configuration
//!
//! Everything the binary needs to wire a resolver: where the node is,
//! which contracts to talk to, and how long derived pool addresses stay
//! cached. Loaded from the environment (with `.env` support) or a TOML file.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::cartographer::{DEFAULT_CACHE_TTL_SECS, MAX_CALLS_PER_BATCH, MULTICALL3, V3_CORE_FACTORY_ADDRESS};
use crate::router::SWAP_ROUTER_ADDRESS;

/// Largest batch we allow before an eth_call risks the node's gas cap
const MAX_SANE_BATCH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    /// RPC URL (Alchemy/Infura recommended)
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    // ========== Contracts ==========
    /// Multicall3 deployment used for batched reads
    pub multicall_address: String,

    /// Uniswap V3 factory that pool addresses are derived from
    pub v3_factory_address: String,

    /// SwapRouter02 answering approval type queries
    pub swap_router_address: String,

    // ========== Batching & Caching ==========
    /// How long a derived pool address stays cached
    pub pool_address_cache_ttl_secs: u64,

    /// Maximum calls per Multicall3 eth_call
    pub max_calls_per_batch: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_or("CHAIN_ID", defaults.chain_id),
            multicall_address: env::var("MULTICALL_ADDRESS").unwrap_or(defaults.multicall_address),
            v3_factory_address: env::var("V3_FACTORY_ADDRESS").unwrap_or(defaults.v3_factory_address),
            swap_router_address: env::var("SWAP_ROUTER_ADDRESS").unwrap_or(defaults.swap_router_address),
            pool_address_cache_ttl_secs: env_or(
                "POOL_ADDRESS_CACHE_TTL_SECS",
                defaults.pool_address_cache_ttl_secs,
            ),
            max_calls_per_batch: env_or("MAX_CALLS_PER_BATCH", defaults.max_calls_per_batch),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn multicall(&self) -> Result<Address> {
        parse_address("MULTICALL_ADDRESS", &self.multicall_address)
    }

    pub fn v3_factory(&self) -> Result<Address> {
        parse_address("V3_FACTORY_ADDRESS", &self.v3_factory_address)
    }

    pub fn swap_router(&self) -> Result<Address> {
        parse_address("SWAP_ROUTER_ADDRESS", &self.swap_router_address)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pool_address_cache_ttl_secs)
    }

    /// Validate configuration before wiring anything
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL - please set a valid Alchemy/Infura URL"));
        }

        self.multicall()?;
        self.v3_factory()?;
        self.swap_router()?;

        if self.pool_address_cache_ttl_secs == 0 {
            return Err(eyre!("POOL_ADDRESS_CACHE_TTL_SECS must be greater than zero"));
        }
        if self.max_calls_per_batch == 0 || self.max_calls_per_batch > MAX_SANE_BATCH {
            return Err(eyre!(
                "MAX_CALLS_PER_BATCH should be between 1-{} (currently {})",
                MAX_SANE_BATCH,
                self.max_calls_per_batch
            ));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let rpc = shorten(&self.rpc_url, 40);

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              POOL RESOLVER - CONFIGURATION                 ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ RPC:               {:<40} ║", rpc);
        println!("║ Chain ID:          {:<40} ║", self.chain_id);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CONTRACTS                                                  ║");
        println!("║ • Multicall3:      {:<40} ║", self.multicall_address);
        println!("║ • V3 Factory:      {:<40} ║", self.v3_factory_address);
        println!("║ • Swap Router:     {:<40} ║", self.swap_router_address);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ BATCHING                                                   ║");
        println!("║ • Address TTL:     {:<38} s ║", self.pool_address_cache_ttl_secs);
        println!("║ • Calls/Batch:     {:<40} ║", self.max_calls_per_batch);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Truncate to at most `max` characters, marking the cut with "..."
fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    Address::from_str(value).map_err(|e| eyre!("Invalid {} '{}': {}", name, value, e))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://eth.llamarpc.com".to_string(),
            chain_id: 1,
            multicall_address: format!("{:?}", MULTICALL3),
            v3_factory_address: format!("{:?}", V3_CORE_FACTORY_ADDRESS),
            swap_router_address: format!("{:?}", SWAP_ROUTER_ADDRESS),
            pool_address_cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_calls_per_batch: MAX_CALLS_PER_BATCH,
        }
    }
}

// ============================================
// TESTS
// ============================================
