//! Pair canonicalization and pool address derivation
//!
//! V3 pools are deployed with CREATE2, so their address is a pure function
//! of (factory, token0, token1, fee). No RPC call is needed to find one.

use alloy_primitives::{address, b256, keccak256, Address, B256};
use alloy_sol_types::SolValue;
use std::sync::Arc;
use tracing::trace;

use super::address_cache::{AddressCache, PairKey};
use super::pool::FeeAmount;
use crate::tokens::Token;

/// Uniswap V3 factory on mainnet
pub const V3_CORE_FACTORY_ADDRESS: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

/// keccak256 of the UniswapV3Pool creation code
pub const POOL_INIT_CODE_HASH: B256 =
    b256!("e34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54");

/// Pure pool address derivation. Inputs are already sorted.
pub trait PoolAddressDerivation: Send + Sync {
    fn derive(&self, factory: Address, token0: Address, token1: Address, fee: FeeAmount) -> Address;
}

/// CREATE2 derivation used by the V3 factory
#[derive(Debug, Clone, Copy)]
pub struct Create2Derivation {
    init_code_hash: B256,
}

impl Create2Derivation {
    pub fn new(init_code_hash: B256) -> Self {
        Self { init_code_hash }
    }
}

impl Default for Create2Derivation {
    fn default() -> Self {
        Self::new(POOL_INIT_CODE_HASH)
    }
}

impl PoolAddressDerivation for Create2Derivation {
    fn derive(&self, factory: Address, token0: Address, token1: Address, fee: FeeAmount) -> Address {
        // abi.encode pads the uint24 fee to a full word, same as a uint256
        let salt = keccak256((token0, token1, fee.as_u32()).abi_encode());
        factory.create2(salt, self.init_code_hash)
    }
}

/// A request after sorting, with its derived pool address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPair {
    pub factory: Address,
    pub token0: Token,
    pub token1: Token,
    pub fee: FeeAmount,
    pub address: Address,
}

impl CanonicalPair {
    pub fn key(&self) -> PairKey {
        PairKey {
            factory: self.factory,
            token0: self.token0.address,
            token1: self.token1.address,
            fee: self.fee,
        }
    }
}

impl std::fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.token0, self.token1, self.fee)
    }
}

/// Sorts pair requests and maps them to pool addresses through the cache
#[derive(Clone)]
pub struct PairCanonicalizer {
    factory: Address,
    cache: Arc<AddressCache>,
    derivation: Arc<dyn PoolAddressDerivation>,
}

impl PairCanonicalizer {
    pub fn new(
        factory: Address,
        cache: Arc<AddressCache>,
        derivation: Arc<dyn PoolAddressDerivation>,
    ) -> Self {
        Self {
            factory,
            cache,
            derivation,
        }
    }

    /// Mainnet V3 factory with CREATE2 derivation
    pub fn mainnet(cache: Arc<AddressCache>) -> Self {
        Self::new(V3_CORE_FACTORY_ADDRESS, cache, Arc::new(Create2Derivation::default()))
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn cache(&self) -> &Arc<AddressCache> {
        &self.cache
    }

    pub fn canonicalize(&self, token_a: &Token, token_b: &Token, fee: FeeAmount) -> CanonicalPair {
        let (token0, token1) = if token_a.sorts_before(token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };

        let key = PairKey {
            factory: self.factory,
            token0: token0.address,
            token1: token1.address,
            fee,
        };

        let address = match self.cache.get(&key) {
            Some(address) => address,
            None => {
                let address = self.derivation.derive(self.factory, key.token0, key.token1, fee);
                trace!("Derived pool {:?} for {}/{}/{}", address, token0, token1, fee);
                self.cache.set(key, address);
                address
            }
        };

        CanonicalPair {
            factory: self.factory,
            token0: token0.clone(),
            token1: token1.clone(),
            fee,
            address,
        }
    }
}
