//! # Quote Cache
//!
//! Short-TTL memoisation of pool snapshots and USD prices. A miss is never
//! an error, expired entries behave as misses and are purged on read, and
//! set failures are the caller's problem to ignore: the cache is an
//! accelerator, not a source of truth.
//!
//! Two backends: an in-process map for single-instance deployments and a
//! Redis backend when `REDIS_ADDR` is configured. Values cross the wire as
//! JSON with big integers encoded as decimal strings.

use async_trait::async_trait;
use ethers::types::Address;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::errors::CacheError;
use crate::types::{sort_tokens, DexProtocol, PoolSnapshot};

/// Default snapshot TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Canonical pool cache key: `pair:{venue}:{token0}:{token1}` with the token
/// hex lowercased and ordered ascending.
pub fn pool_key(dex: DexProtocol, token_a: Address, token_b: Address) -> String {
    let (token0, token1) = sort_tokens(token_a, token_b);
    format!("pair:{}:{:x}:{:x}", dex, token0, token1)
}

/// Price cache key for a token's USD quote.
pub fn price_key(token: Address) -> String {
    format!("price:{:x}", token)
}

#[async_trait]
pub trait QuoteCache: Send + Sync + std::fmt::Debug {
    async fn get_pool(&self, key: &str) -> Result<Option<PoolSnapshot>, CacheError>;
    async fn set_pool(
        &self,
        key: &str,
        snapshot: &PoolSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError>;
    async fn get_price(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_price(&self, key: &str, price: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

//================================================================================================//
//                                       IN-PROCESS BACKEND                                      //
//================================================================================================//

/// Per-process cache over two locked maps.
#[derive(Debug, Default)]
pub struct MemoryCache {
    pools: RwLock<HashMap<String, (PoolSnapshot, Instant)>>,
    prices: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteCache for MemoryCache {
    async fn get_pool(&self, key: &str) -> Result<Option<PoolSnapshot>, CacheError> {
        {
            let pools = self.pools.read().await;
            match pools.get(key) {
                Some((snapshot, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(snapshot.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: purge under the write lock, then report a miss.
        self.pools.write().await.remove(key);
        Ok(None)
    }

    async fn set_pool(
        &self,
        key: &str,
        snapshot: &PoolSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.pools
            .write()
            .await
            .insert(key.to_string(), (snapshot.clone(), expires_at));
        Ok(())
    }

    async fn get_price(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let prices = self.prices.read().await;
            match prices.get(key) {
                Some((price, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(price.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.prices.write().await.remove(key);
        Ok(None)
    }

    async fn set_price(&self, key: &str, price: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.prices
            .write()
            .await
            .insert(key.to_string(), (price.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.pools.write().await.remove(key);
        self.prices.write().await.remove(key);
        Ok(())
    }
}

//================================================================================================//
//                                         REDIS BACKEND                                         //
//================================================================================================//

/// Redis-backed cache. TTLs are delegated to the server, so expired entries
/// never come back at all.
#[derive(Clone)]
pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects and verifies the server is reachable. Callers fall back to
    /// [`MemoryCache`] when this fails.
    pub async fn connect(addr: &str) -> Result<Self, CacheError> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };
        let client = redis::Client::open(url).map_err(|e| CacheError::Redis(e.to_string()))?;
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Redis(e.to_string()))?;
        Ok(Self { manager })
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::Redis(e.to_string()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Redis(e.to_string()))
    }
}

#[async_trait]
impl QuoteCache for RedisCache {
    async fn get_pool(&self, key: &str) -> Result<Option<PoolSnapshot>, CacheError> {
        match self.get_raw(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set_pool(
        &self,
        key: &str,
        snapshot: &PoolSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(snapshot).map_err(|e| CacheError::Codec(e.to_string()))?;
        self.set_raw(key, raw, ttl).await
    }

    async fn get_price(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get_raw(key).await
    }

    async fn set_price(&self, key: &str, price: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_raw(key, price.to_string(), ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        conn.del(key)
            .await
            .map_err(|e| CacheError::Redis(e.to_string()))
    }
}
