//! Pool address cache
//!
//! Computing a pool address means ABI encoding and two keccak rounds, so the
//! canonicalizer memoizes it. Entries expire a fixed time after insertion;
//! reads never extend their life.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::pool::FeeAmount;

/// Default lifetime of a cached pool address
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Canonical identity of a pool: token0 < token1 under one factory.
///
/// The factory is part of the key so canonicalizers for different
/// deployments can share a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeAmount,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    address: Address,
    inserted_at: Instant,
}

/// Expiring `PairKey -> pool address` map shared across resolver calls
#[derive(Debug)]
pub struct AddressCache {
    entries: RwLock<HashMap<PairKey, CacheEntry>>,
    ttl: Duration,
}

impl AddressCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached address for `key`, or `None` if missing or expired
    pub fn get(&self, key: &PairKey) -> Option<Address> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;

        if entry.inserted_at.elapsed() >= self.ttl {
            trace!("Pool address cache expired for {:?}", key);
            return None;
        }

        Some(entry.address)
    }

    /// Insert or overwrite; the TTL restarts from now
    pub fn set(&self, key: PairKey, address: Address) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                address,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::sync::Arc;

    fn key() -> PairKey {
        PairKey {
            factory: address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
            token0: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            token1: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            fee: FeeAmount::Low,
        }
    }

    const POOL: Address = address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640");

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set() {
        let cache = AddressCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key()), None);

        cache.set(key(), POOL);
        assert_eq!(cache.get(&key()), Some(POOL));
        assert_eq!(cache.len(), 1);

        let other = PairKey { fee: FeeAmount::Medium, ..key() };
        assert_eq!(cache.get(&other), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_factory_is_part_of_key() {
        let cache = AddressCache::default();
        cache.set(key(), POOL);

        let other_factory = PairKey {
            factory: address!("0000000000000000000000000000000000000abc"),
            ..key()
        };
        assert_eq!(cache.get(&other_factory), None);
        assert_eq!(cache.get(&key()), Some(POOL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = AddressCache::new(Duration::from_secs(60));
        cache.set(key(), POOL);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key()), Some(POOL));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_ttl() {
        let cache = AddressCache::new(Duration::from_secs(10));
        cache.set(key(), POOL);

        for _ in 0..9 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert_eq!(cache.get(&key()), Some(POOL));
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_restarts_ttl() {
        let cache = AddressCache::new(Duration::from_secs(10));
        cache.set(key(), POOL);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(cache.get(&key()), None);

        cache.set(key(), POOL);
        assert_eq!(cache.get(&key()), Some(POOL));
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = Arc::new(AddressCache::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        cache.set(key(), POOL);
                        assert_eq!(cache.get(&key()), Some(POOL));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 1);
    }
}
