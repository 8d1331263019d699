//! The Cartographer: pair requests in, pool snapshots out
//!
//! Two batched Multicall3 reads per resolve, no matter how many pairs.

mod address_cache;
pub(crate) mod multicall;
pub(crate) mod pair;
mod pool;
mod resolver;

pub use address_cache::{AddressCache, PairKey, DEFAULT_CACHE_TTL_SECS};
pub use multicall::{
    fetch_same_call, fetch_with_params, BatchResponse, BatchStateFetcher, CallResult, DecodedBatch,
    Multicall3Fetcher, RawCallResult, MAX_CALLS_PER_BATCH, MULTICALL3,
};
pub use pair::{
    CanonicalPair, Create2Derivation, PairCanonicalizer, PoolAddressDerivation, POOL_INIT_CODE_HASH,
    V3_CORE_FACTORY_ADDRESS,
};
pub use pool::{FeeAmount, PoolSummary, V3Pool, MAX_TICK, MIN_TICK};
pub use resolver::{PoolAccessor, PoolResolver};
