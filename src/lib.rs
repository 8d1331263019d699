//! Uniswap V3 pool resolution over batched RPC reads
//!
//! ```text
//! (tokenA, tokenB, fee)*  -> PairCanonicalizer (+ AddressCache)
//!                         -> dedup by pool address
//!                         -> slot0 || liquidity   (two Multicall3 batches)
//!                         -> positional join + validation
//!                         -> PoolAccessor
//! ```

pub mod cartographer;
pub mod config;
pub mod router;
pub mod tokens;

pub use cartographer::{
    AddressCache, BatchStateFetcher, FeeAmount, Multicall3Fetcher, PairCanonicalizer, PoolAccessor,
    PoolResolver, V3Pool,
};
pub use config::Config;
pub use router::{ApprovalResolver, ApprovalType, TokenApprovalTypes};
pub use tokens::{Token, TokenAmount};
