// src/config.rs

//! # Configuration
//!
//! Everything the aggregator needs to know about its chain lives in
//! `ChainConfig`, constructed once at startup and passed down explicitly:
//! factory and quoter addresses, the Curve and Balancer pool tables, fee
//! tiers, and the anchor tokens for USD pricing. `AppConfig` adds the
//! process-level settings read from the environment.

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public fallback used when `ETH_RPC_URL` is unset.
pub const DEFAULT_RPC_URL: &str = "https://eth.llamarpc.com";

/// Process-level configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc_url: String,
    /// External cache address; `None` selects the in-process backend.
    pub redis_addr: Option<String>,
    pub port: u16,
    pub chain: ChainConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let rpc_url =
            std::env::var("ETH_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        let redis_addr = std::env::var("REDIS_ADDR").ok().filter(|s| !s.is_empty());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Self {
            rpc_url,
            redis_addr,
            port,
            chain: ChainConfig::mainnet(),
        }
    }
}

/// One Curve stable pool: the ordered coin list mirrors the on-chain
/// indices passed to `get_dy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoolConfig {
    pub address: Address,
    pub coins: Vec<Address>,
    pub name: String,
}

/// One Balancer weighted pool. Weights are in basis points and sum to
/// 10000; balances are always fetched live from the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerPoolConfig {
    pub pool_id: H256,
    pub address: Address,
    pub tokens: Vec<Address>,
    pub weights: Vec<u64>,
    pub swap_fee_bps: u64,
    pub name: String,
}

/// Per-chain venue constants and tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub uniswap_v2_factory: Address,
    pub sushiswap_factory: Address,
    pub uniswap_v3_factory: Address,
    pub uniswap_v3_quoter: Address,
    /// V3 fee tiers in 1/1_000_000 units.
    pub v3_fee_tiers: Vec<u32>,
    pub balancer_vault: Address,
    pub curve_pools: Vec<CurvePoolConfig>,
    pub balancer_pools: Vec<BalancerPoolConfig>,
    /// Wrapped-native token, the universal routing intermediary.
    pub wrapped_native: Address,
    /// Canonical USD stable anchoring `priceUSD`.
    pub usd_stable: Address,
    /// Candidate intermediates for two-hop routing.
    pub intermediate_tokens: Vec<Address>,
    pub max_concurrent_calls: usize,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl ChainConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Ethereum mainnet constants. The literals are known-good, so the
    /// parses cannot fail.
    pub fn mainnet() -> Self {
        let weth: Address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
            .parse()
            .expect("WETH address");
        let usdc: Address = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
            .parse()
            .expect("USDC address");
        let usdt: Address = "0xdAC17F958D2ee523a2206206994597C13D831ec7"
            .parse()
            .expect("USDT address");
        let dai: Address = "0x6B175474E89094C44Da98b954EedeAC495271d0F"
            .parse()
            .expect("DAI address");

        Self {
            uniswap_v2_factory: "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"
                .parse()
                .expect("V2 factory address"),
            sushiswap_factory: "0xC0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac"
                .parse()
                .expect("Sushiswap factory address"),
            uniswap_v3_factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984"
                .parse()
                .expect("V3 factory address"),
            uniswap_v3_quoter: "0x61fFE014bA17989E743c5F6cB21bF9697530B21e"
                .parse()
                .expect("V3 quoter address"),
            v3_fee_tiers: vec![100, 500, 3_000, 10_000],
            balancer_vault: "0xBA12222222228d8Ba445958a75a0704d566BF2C8"
                .parse()
                .expect("Balancer vault address"),
            curve_pools: vec![CurvePoolConfig {
                address: "0xbEbc44782C7dB0a1A60Cb6fe97d0b483032FF1C7"
                    .parse()
                    .expect("3pool address"),
                coins: vec![dai, usdc, usdt],
                name: "3pool".to_string(),
            }],
            balancer_pools: vec![
                BalancerPoolConfig {
                    pool_id: "0x0b09dea16768f0799065c475be02919503cb2a3500020000000000000000001a"
                        .parse()
                        .expect("WETH/DAI pool id"),
                    address: "0x0b09deA16768f0799065C475bE02919503cB2a35"
                        .parse()
                        .expect("WETH/DAI pool address"),
                    tokens: vec![weth, dai],
                    weights: vec![6_000, 4_000],
                    swap_fee_bps: 30,
                    name: "WETH/DAI 60/40".to_string(),
                },
                BalancerPoolConfig {
                    pool_id: "0x96646936b91d6b9d7d0c47c496afbf3d6ec7b6f8000200000000000000000019"
                        .parse()
                        .expect("WETH/USDC pool id"),
                    address: "0x96646936b91d6B9D7D0c47C496AfBF3D6ec7B6f8"
                        .parse()
                        .expect("WETH/USDC pool address"),
                    tokens: vec![weth, usdc],
                    weights: vec![5_000, 5_000],
                    swap_fee_bps: 30,
                    name: "WETH/USDC 50/50".to_string(),
                },
            ],
            wrapped_native: weth,
            usd_stable: usdc,
            intermediate_tokens: vec![weth, usdc, dai],
            max_concurrent_calls: crate::blockchain::DEFAULT_MAX_CONCURRENT_CALLS,
            cache_ttl_secs: 10,
            request_timeout_secs: 30,
        }
    }
}
