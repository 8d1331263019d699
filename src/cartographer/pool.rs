//! Uniswap V3 pool snapshot types

use alloy_primitives::{Address, U256};
use eyre::{eyre, Result};
use serde::Serialize;
use std::fmt;

use crate::tokens::Token;

/// Lowest tick a V3 pool can be at
pub const MIN_TICK: i32 = -887272;

/// Highest tick a V3 pool can be at
pub const MAX_TICK: i32 = 887272;

// ============================================
// FEE TIERS
// ============================================

/// The fee tiers enabled on the V3 factory, in hundredths of a bip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeeAmount {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeAmount {
    pub const ALL: [FeeAmount; 4] = [
        FeeAmount::Lowest,
        FeeAmount::Low,
        FeeAmount::Medium,
        FeeAmount::High,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            FeeAmount::Lowest => 100,
            FeeAmount::Low => 500,
            FeeAmount::Medium => 3000,
            FeeAmount::High => 10000,
        }
    }

    pub fn tick_spacing(self) -> i32 {
        match self {
            FeeAmount::Lowest => 1,
            FeeAmount::Low => 10,
            FeeAmount::Medium => 60,
            FeeAmount::High => 200,
        }
    }
}

impl TryFrom<u32> for FeeAmount {
    type Error = eyre::Report;

    fn try_from(fee: u32) -> Result<Self> {
        FeeAmount::ALL
            .into_iter()
            .find(|f| f.as_u32() == fee)
            .ok_or_else(|| eyre!("Unsupported fee tier {} (expected 100, 500, 3000 or 10000)", fee))
    }
}

impl fmt::Display for FeeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_u32() as f64 / 10000.0)
    }
}

// ============================================
// POOL
// ============================================

/// A validated V3 pool snapshot.
///
/// Only built from a successful slot0 + liquidity read with a nonzero price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Pool {
    pub token0: Token,
    pub token1: Token,
    pub fee: FeeAmount,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
}

impl V3Pool {
    pub fn new(
        token_a: Token,
        token_b: Token,
        fee: FeeAmount,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    ) -> Result<Self> {
        if sqrt_price_x96.is_zero() {
            return Err(eyre!("Pool {}/{} has a zero sqrt price", token_a, token_b));
        }
        if !(MIN_TICK..=MAX_TICK).contains(&tick) {
            return Err(eyre!("Tick {} out of range for {}/{}", tick, token_a, token_b));
        }

        let (token0, token1) = if token_a.sorts_before(&token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };

        Ok(Self {
            token0,
            token1,
            fee,
            sqrt_price_x96,
            liquidity,
            tick,
        })
    }

    pub fn involves_token(&self, token: &Token) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// Price of token0 denominated in token1, adjusted for decimals
    pub fn token0_price(&self) -> f64 {
        let sp = self
            .sqrt_price_x96
            .as_limbs()
            .iter()
            .rev()
            .fold(0.0_f64, |acc, &limb| acc * 2_f64.powi(64) + limb as f64);
        let price_raw = (sp / 2_f64.powi(96)).powi(2);
        price_raw * 10_f64.powi(self.token0.decimals as i32 - self.token1.decimals as i32)
    }

    /// Price of token1 denominated in token0
    pub fn token1_price(&self) -> f64 {
        let p = self.token0_price();
        if p == 0.0 {
            0.0
        } else {
            1.0 / p
        }
    }

    pub fn summary(&self, address: Address) -> PoolSummary {
        PoolSummary {
            address,
            token0: self.token0.symbol.clone(),
            token1: self.token1.symbol.clone(),
            fee: self.fee.as_u32(),
            sqrt_price_x96: self.sqrt_price_x96.to_string(),
            liquidity: self.liquidity.to_string(),
            tick: self.tick,
            token0_price: self.token0_price(),
        }
    }
}

impl fmt::Display for V3Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.token0, self.token1, self.fee)
    }
}

/// Flat, serializable view of a pool for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct PoolSummary {
    pub address: Address,
    pub token0: String,
    pub token1: String,
    pub fee: u32,
    pub sqrt_price_x96: String,
    pub liquidity: String,
    pub tick: i32,
    pub token0_price: f64,
}
