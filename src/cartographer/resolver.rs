//! Pool Resolver
//!
//! Turns (tokenA, tokenB, fee) requests into V3 pool snapshots with exactly
//! two batched reads, slot0 and liquidity, issued concurrently over the same
//! deduplicated address list. Results are joined by index.

use alloy_primitives::{Address, U256};
use alloy_sol_types::sol;
use eyre::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::multicall::{fetch_same_call, BatchStateFetcher, CallResult};
use super::pair::{CanonicalPair, PairCanonicalizer};
use super::pool::{FeeAmount, V3Pool};
use crate::tokens::Token;

// ============================================
// POOL INTERFACE
// ============================================

sol! {
    interface IUniswapV3PoolState {
        function slot0() external view returns (
            uint160 sqrtPriceX96, int24 tick, uint16 observationIndex,
            uint16 observationCardinality, uint16 observationCardinalityNext,
            uint8 feeProtocol, bool unlocked
        );
        function liquidity() external view returns (uint128);
    }
}

type Slot0 = IUniswapV3PoolState::slot0Return;

// ============================================
// ACCESSOR
// ============================================

/// Read-only snapshot of the pools found by one `resolve` call.
///
/// Lookups re-derive the pool address from the arguments, so a pair can be
/// queried in either token order, and duplicates dropped during batching
/// still resolve.
pub struct PoolAccessor {
    canonicalizer: PairCanonicalizer,
    pools: HashMap<Address, V3Pool>,
    block_number: u64,
}

impl std::fmt::Debug for PoolAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAccessor")
            .field("block_number", &self.block_number)
            .field("pools", &self.pools)
            .finish()
    }
}

impl PoolAccessor {
    pub fn get_pool(&self, token_a: &Token, token_b: &Token, fee: FeeAmount) -> Option<&V3Pool> {
        let pair = self.canonicalizer.canonicalize(token_a, token_b, fee);
        self.pools.get(&pair.address)
    }

    /// All resolved pools, in no particular order
    pub fn get_all_pools(&self) -> Vec<&V3Pool> {
        self.pools.values().collect()
    }

    /// Resolved pools together with their addresses
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &V3Pool)> {
        self.pools.iter()
    }

    /// Block the slot0 batch was read at
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

// ============================================
// RESOLVER
// ============================================

pub struct PoolResolver {
    canonicalizer: PairCanonicalizer,
    fetcher: Arc<dyn BatchStateFetcher>,
}

impl PoolResolver {
    pub fn new(canonicalizer: PairCanonicalizer, fetcher: Arc<dyn BatchStateFetcher>) -> Self {
        Self {
            canonicalizer,
            fetcher,
        }
    }

    pub async fn resolve(&self, token_pairs: &[(Token, Token, FeeAmount)]) -> Result<PoolAccessor> {
        let start = Instant::now();

        let pairs = self.dedup_pairs(token_pairs);
        let addresses: Vec<Address> = pairs.iter().map(|p| p.address).collect();

        debug!(
            "resolve called with {} token pairs. Deduped down to {}",
            token_pairs.len(),
            addresses.len()
        );

        if addresses.is_empty() {
            return Ok(PoolAccessor {
                canonicalizer: self.canonicalizer.clone(),
                pools: HashMap::new(),
                block_number: 0,
            });
        }

        info!("About to get liquidity and slot0s for {} pools.", addresses.len());

        let fetcher = self.fetcher.as_ref();
        let (slot0s, liquidities) = tokio::try_join!(
            fetch_same_call(fetcher, &addresses, &IUniswapV3PoolState::slot0Call {}),
            fetch_same_call(fetcher, &addresses, &IUniswapV3PoolState::liquidityCall {}),
        )?;

        debug!(
            "Pool data fetched as of block {} (liquidity at {})",
            slot0s.block_number, liquidities.block_number
        );

        let pools: HashMap<Address, V3Pool> = pairs
            .into_iter()
            .zip(slot0s.results)
            .zip(liquidities.results)
            .enumerate()
            .filter_map(|(i, ((pair, slot0), liquidity))| {
                build_pool(i, &pair, slot0, liquidity).map(|pool| (pair.address, pool))
            })
            .collect();

        info!(
            "Found {} valid pools out of {} in {:?}",
            pools.len(),
            addresses.len(),
            start.elapsed()
        );
        debug!(
            "Valid pools: {:?}",
            pools.values().map(|p| p.to_string()).collect::<Vec<_>>()
        );

        Ok(PoolAccessor {
            canonicalizer: self.canonicalizer.clone(),
            pools,
            block_number: slot0s.block_number,
        })
    }

    /// Canonicalize every request, keeping the first pair seen per address
    fn dedup_pairs(&self, token_pairs: &[(Token, Token, FeeAmount)]) -> Vec<CanonicalPair> {
        let mut seen: HashSet<Address> = HashSet::with_capacity(token_pairs.len());
        let mut pairs = Vec::with_capacity(token_pairs.len());

        for (token_a, token_b, fee) in token_pairs {
            let pair = self.canonicalizer.canonicalize(token_a, token_b, *fee);
            if seen.insert(pair.address) {
                pairs.push(pair);
            }
        }

        pairs
    }
}

/// Validate the joined reads for one pool. `None` means drop it.
fn build_pool(
    index: usize,
    pair: &CanonicalPair,
    slot0: CallResult<Slot0>,
    liquidity: CallResult<u128>,
) -> Option<V3Pool> {
    let (slot0, liquidity) = match (slot0, liquidity) {
        (CallResult::Success(slot0), CallResult::Success(liquidity)) if !slot0.sqrtPriceX96.is_zero() => {
            (slot0, liquidity)
        }
        (slot0, liquidity) => {
            info!(
                "Pool Invalid for {} at index {} (slot0 ok: {}, liquidity ok: {}). Dropping.",
                pair,
                index,
                slot0.is_success(),
                liquidity.is_success()
            );
            return None;
        }
    };

    let sqrt_price_x96 = U256::from(slot0.sqrtPriceX96);
    let tick = slot0.tick.as_i32();

    match V3Pool::new(
        pair.token0.clone(),
        pair.token1.clone(),
        pair.fee,
        sqrt_price_x96,
        liquidity,
        tick,
    ) {
        Ok(pool) => Some(pool),
        Err(e) => {
            info!("Pool Invalid for {} at index {}: {}. Dropping.", pair, index, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::multicall::testing::{failed, ok, MockFetcher};
    use crate::cartographer::pair::testing::counting_canonicalizer;
    use crate::tokens::fixtures::*;
    use alloy_primitives::aliases::{I24, U160};
    use alloy_sol_types::{sol_data, SolCall, SolType, SolValue};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    type Slot0Call = IUniswapV3PoolState::slot0Call;
    type LiquidityCall = IUniswapV3PoolState::liquidityCall;

    type Slot0Tuple = (
        sol_data::Uint<160>,
        sol_data::Int<24>,
        sol_data::Uint<16>,
        sol_data::Uint<16>,
        sol_data::Uint<16>,
        sol_data::Uint<8>,
        sol_data::Bool,
    );

    fn slot0(sqrt_price: u64, tick: i32) -> Vec<u8> {
        Slot0Tuple::abi_encode_params(&(
            U160::from(sqrt_price),
            I24::try_from(tick).unwrap(),
            0u16,
            1u16,
            1u16,
            0u8,
            true,
        ))
    }

    fn liquidity(value: u128) -> Vec<u8> {
        value.abi_encode()
    }

    fn resolver(fetcher: Arc<MockFetcher>) -> PoolResolver {
        let (canonicalizer, _) = counting_canonicalizer(Duration::from_secs(3600));
        PoolResolver::new(canonicalizer, fetcher)
    }

    #[tokio::test]
    async fn test_dedup_sends_distinct_addresses() {
        let fetcher = Arc::new(MockFetcher::new(100));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(1 << 40, 10)), ok(slot0(1 << 40, 20))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(50)), ok(liquidity(20))]);

        let resolver = resolver(fetcher.clone());
        let accessor = resolver
            .resolve(&[
                (weth(), usdc(), FeeAmount::Low),
                (usdc(), weth(), FeeAmount::Low),
                (weth(), wbtc(), FeeAmount::Medium),
            ])
            .await
            .unwrap();

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        for (addresses, _) in &requests {
            assert_eq!(addresses.len(), 2);
            assert_ne!(addresses[0], addresses[1]);
        }
        // Both batches use the same ordering
        assert_eq!(requests[0].0, requests[1].0);

        let selectors: HashSet<[u8; 4]> = requests.iter().map(|(_, s)| *s).collect();
        assert!(selectors.contains(&Slot0Call::SELECTOR));
        assert!(selectors.contains(&LiquidityCall::SELECTOR));

        assert_eq!(accessor.len(), 2);
        assert_eq!(accessor.block_number(), 100);
    }

    #[tokio::test]
    async fn test_zero_price_pool_is_dropped() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(100, 0)), ok(slot0(0, 0))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(50)), ok(liquidity(20))]);

        let accessor = resolver(fetcher)
            .resolve(&[
                (usdc(), weth(), FeeAmount::Low),
                (wbtc(), weth(), FeeAmount::Medium),
            ])
            .await
            .unwrap();

        assert_eq!(accessor.len(), 1);
        let pool = accessor.get_pool(&usdc(), &weth(), FeeAmount::Low).unwrap();
        assert_eq!(pool.sqrt_price_x96, U256::from(100u64));
        assert_eq!(pool.liquidity, 50);
        assert!(accessor.get_pool(&wbtc(), &weth(), FeeAmount::Medium).is_none());
    }

    #[tokio::test]
    async fn test_failed_liquidity_only_drops_that_pool() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(100, 5)), ok(slot0(200, -5)), ok(slot0(300, 0))]);
        fetcher.respond::<LiquidityCall>(vec![failed(), ok(liquidity(20)), ok(liquidity(30))]);

        let accessor = resolver(fetcher)
            .resolve(&[
                (usdc(), weth(), FeeAmount::Low),
                (wbtc(), weth(), FeeAmount::Medium),
                (dai(), weth(), FeeAmount::Medium),
            ])
            .await
            .unwrap();

        assert_eq!(accessor.len(), 2);
        assert!(accessor.get_pool(&usdc(), &weth(), FeeAmount::Low).is_none());

        let wbtc_pool = accessor.get_pool(&wbtc(), &weth(), FeeAmount::Medium).unwrap();
        assert_eq!(wbtc_pool.tick, -5);
        assert_eq!(wbtc_pool.liquidity, 20);

        let dai_pool = accessor.get_pool(&weth(), &dai(), FeeAmount::Medium).unwrap();
        assert_eq!(dai_pool.sqrt_price_x96, U256::from(300u64));
    }

    #[tokio::test]
    async fn test_failed_slot0_drops_pool() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![failed()]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(20))]);

        let accessor = assert_ok!(
            resolver(fetcher)
                .resolve(&[(usdc(), weth(), FeeAmount::Low)])
                .await
        );
        assert!(accessor.is_empty());
        assert!(accessor.get_all_pools().is_empty());
    }

    #[tokio::test]
    async fn test_accessor_is_symmetric() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(1 << 50, 100))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(7))]);

        let accessor = resolver(fetcher)
            .resolve(&[(weth(), usdc(), FeeAmount::Low)])
            .await
            .unwrap();

        let ab = accessor.get_pool(&weth(), &usdc(), FeeAmount::Low).unwrap();
        let ba = accessor.get_pool(&usdc(), &weth(), FeeAmount::Low).unwrap();
        assert!(std::ptr::eq(ab, ba));
        assert_eq!(ab.token0, usdc());

        // Same pair, tier never requested
        assert!(accessor.get_pool(&weth(), &usdc(), FeeAmount::High).is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_fails_resolve() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(100, 0))]);
        fetcher.fail::<LiquidityCall>("connection reset by peer");

        let result = resolver(fetcher)
            .resolve(&[(usdc(), weth(), FeeAmount::Low)])
            .await;
        assert_err!(result);
    }

    #[tokio::test]
    async fn test_short_result_list_fails_resolve() {
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(100, 0))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(1))]);

        let result = resolver(fetcher)
            .resolve(&[
                (usdc(), weth(), FeeAmount::Low),
                (dai(), weth(), FeeAmount::Low),
            ])
            .await;
        assert_err!(result);
    }

    #[tokio::test]
    async fn test_empty_request_makes_no_calls() {
        let fetcher = Arc::new(MockFetcher::new(1));
        let accessor = resolver(fetcher.clone()).resolve(&[]).await.unwrap();

        assert!(accessor.is_empty());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_slot0_and_liquidity_batches_run_concurrently() {
        // Each batch blocks until both are in flight, so sequential reads never finish
        let fetcher = Arc::new(MockFetcher::new(9).with_barrier(2));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(1 << 40, 0))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(7))]);

        let resolver = resolver(fetcher.clone());
        let pairs = [(usdc(), weth(), FeeAmount::Low)];
        let resolved = tokio::time::timeout(Duration::from_secs(5), resolver.resolve(&pairs)).await;

        let accessor = assert_ok!(assert_ok!(resolved));
        assert_eq!(accessor.len(), 1);
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_shared_cache_across_resolves() {
        let (canonicalizer, derivation) = counting_canonicalizer(Duration::from_secs(3600));
        let fetcher = Arc::new(MockFetcher::new(1));
        fetcher.respond::<Slot0Call>(vec![ok(slot0(100, 0))]);
        fetcher.respond::<LiquidityCall>(vec![ok(liquidity(1))]);

        let resolver = PoolResolver::new(canonicalizer, fetcher);
        let pairs = [(usdc(), weth(), FeeAmount::Low), (weth(), usdc(), FeeAmount::Low)];

        let first = resolver.resolve(&pairs).await.unwrap();
        first.get_pool(&weth(), &usdc(), FeeAmount::Low).unwrap();
        resolver.resolve(&pairs).await.unwrap();

        assert_eq!(derivation.calls(), 1);
    }
}
