//! Shared mock harness for the integration tests: configurable venue
//! adapters, a canned-response chain client, and pool/token builders.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use dex_aggregator::blockchain::ChainClient;
use dex_aggregator::cache::MemoryCache;
use dex_aggregator::dex::{DexClient, PoolQuote};
use dex_aggregator::errors::{BlockchainError, DexError};
use dex_aggregator::price_service::PriceService;
use dex_aggregator::router::RouterService;
use dex_aggregator::types::{DexProtocol, PoolSnapshot, Token};

pub fn token(byte: u8, symbol: &str, decimals: u8) -> Token {
    Token {
        address: Address::repeat_byte(byte),
        symbol: symbol.to_string(),
        name: String::new(),
        decimals,
    }
}

pub fn e18(units: u64) -> U256 {
    U256::from(units) * U256::exp10(18)
}

/// A V2-style pool snapshot between two tokens, token order normalised.
pub fn pool(
    dex: DexProtocol,
    a: &Token,
    b: &Token,
    reserve_a: U256,
    reserve_b: U256,
    fee: u64,
) -> PoolSnapshot {
    let (token0, token1, reserve0, reserve1) = if a.address < b.address {
        (a.clone(), b.clone(), reserve_a, reserve_b)
    } else {
        (b.clone(), a.clone(), reserve_b, reserve_a)
    };
    PoolSnapshot {
        address: Address::repeat_byte(0xa0 ^ fee as u8),
        token0,
        token1,
        reserve0,
        reserve1,
        weight0: None,
        weight1: None,
        dex,
        fee,
        updated_at: 0,
    }
}

/// Mock venue adapter: quotes from configured snapshots keyed by unordered
/// token pair, or fails every call.
pub struct MockDexClient {
    protocol: DexProtocol,
    pools: HashMap<(Address, Address), PoolSnapshot>,
    fail: bool,
    pub quote_calls: AtomicUsize,
}

impl MockDexClient {
    pub fn new(protocol: DexProtocol) -> Self {
        Self {
            protocol,
            pools: HashMap::new(),
            fail: false,
            quote_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(protocol: DexProtocol) -> Self {
        let mut client = Self::new(protocol);
        client.fail = true;
        client
    }

    pub fn with_pool(mut self, snapshot: PoolSnapshot) -> Self {
        let key = pair_key(snapshot.token0.address, snapshot.token1.address);
        self.pools.insert(key, snapshot);
        self
    }

    pub fn calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[async_trait]
impl DexClient for MockDexClient {
    fn protocol(&self) -> DexProtocol {
        self.protocol
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        _cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DexError::NoQuote);
        }
        let snapshot = self
            .pools
            .get(&pair_key(token_in.address, token_out.address))
            .cloned()
            .ok_or(DexError::PairNotFound)?;
        let amount_out = snapshot.amount_out(amount_in, token_in.address);
        Ok(PoolQuote {
            snapshot,
            amount_out,
        })
    }
}

/// Chain client with canned `eth_call` responses keyed by target address
/// and function selector.
#[derive(Debug, Default)]
pub struct MockChainClient {
    responses: HashMap<(Address, [u8; 4]), Vec<Bytes>>,
    cursors: std::sync::Mutex<HashMap<(Address, [u8; 4]), usize>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response. Registering the same (to, selector) again
    /// queues additional responses consumed in order, the last one
    /// repeating.
    pub fn respond(mut self, to: Address, selector: [u8; 4], data: Vec<u8>) -> Self {
        self.responses
            .entry((to, selector))
            .or_default()
            .push(Bytes::from(data));
        self
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain_id(&self) -> u64 {
        1
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        _cancel: &CancellationToken,
    ) -> Result<Bytes, BlockchainError> {
        if data.len() < 4 {
            return Err(BlockchainError::CallFailed {
                to,
                message: "missing selector".to_string(),
            });
        }
        let selector = [data[0], data[1], data[2], data[3]];
        let queue = self
            .responses
            .get(&(to, selector))
            .ok_or(BlockchainError::CallFailed {
                to,
                message: "execution reverted".to_string(),
            })?;
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry((to, selector)).or_insert(0);
        let response = queue[(*cursor).min(queue.len() - 1)].clone();
        *cursor += 1;
        Ok(response)
    }
}

/// ABI word helpers for building canned return data.
pub fn word_u256(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

pub fn word_address(value: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(value.as_bytes());
    word
}

/// Wires a router + price service over the given adapters with a fresh
/// in-memory cache, anchored on USDC (6 decimals) and WETH.
pub fn build_router(clients: Vec<Arc<dyn DexClient>>) -> (RouterService, Arc<PriceService>) {
    let prices = Arc::new(PriceService::new(
        clients,
        Arc::new(MemoryCache::new()),
        std::time::Duration::from_secs(10),
        usdc(),
        weth(),
    ));
    (RouterService::new(prices.clone()), prices)
}

pub fn usdc() -> Token {
    token(0xcc, "USDC", 6)
}

pub fn weth() -> Token {
    token(0xee, "WETH", 18)
}
