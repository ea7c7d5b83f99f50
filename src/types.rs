//! # Core Type Definitions
//!
//! Single source of truth for the shared data structures: tokens, venue
//! protocols, pool snapshots, routes, split legs and quotes. Snapshots are
//! immutable once constructed; staleness is handled by cache TTL expiry, not
//! by mutation.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dex_math;

/// Serde helpers that move `U256` across process boundaries (cache values,
/// HTTP payloads) as decimal strings, so unbounded integers survive JSON.
pub mod u256_dec {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(&raw).map_err(D::Error::custom)
    }
}

//================================================================================================//
//                                        TOKENS & VENUES                                        //
//================================================================================================//

/// An ERC-20 token. Addresses are canonical 20-byte values; display casing is
/// a presentation concern only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub decimals: u8,
}

impl Token {
    /// Fallback for addresses the registry has never seen. The decimals
    /// assumption matches the dominant ERC-20 convention.
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            symbol: "UNKNOWN".to_string(),
            name: String::new(),
            decimals: 18,
        }
    }

    /// 10^decimals, one whole unit of this token.
    pub fn one_unit(&self) -> U256 {
        U256::exp10(self.decimals as usize)
    }
}

/// Venue families the aggregator can quote against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexProtocol {
    UniswapV2,
    UniswapV3,
    Sushiswap,
    Curve,
    Balancer,
}

impl std::fmt::Display for DexProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DexProtocol::UniswapV2 => "uniswap_v2",
            DexProtocol::UniswapV3 => "uniswap_v3",
            DexProtocol::Sushiswap => "sushiswap",
            DexProtocol::Curve => "curve",
            DexProtocol::Balancer => "balancer",
        };
        write!(f, "{}", name)
    }
}

/// Orders two token addresses bytewise ascending, the pair-contract
/// convention shared by every venue here.
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

//================================================================================================//
//                                         POOL SNAPSHOT                                         //
//================================================================================================//

/// Point-in-time state of one pool, sufficient to re-quote locally where the
/// venue's curve allows it.
///
/// `fee` is in basis points (denominator 10000) for constant-product and
/// stable pools, and in the finer 1/1_000_000 tier units for V3-style pools.
/// V3 snapshots carry zero reserves: concentrated liquidity cannot be
/// re-quoted locally and callers must treat such snapshots as
/// remote-quote-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub token0: Token,
    pub token1: Token,
    #[serde(with = "u256_dec")]
    pub reserve0: U256,
    #[serde(with = "u256_dec")]
    pub reserve1: U256,
    /// Weight of token0/token1 in basis points, for weighted pools only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight0: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight1: Option<u64>,
    pub dex: DexProtocol,
    pub fee: u64,
    pub updated_at: i64,
}

impl PoolSnapshot {
    pub fn contains(&self, token: Address) -> bool {
        token == self.token0.address || token == self.token1.address
    }

    /// Both reserves strictly positive. False for V3 snapshots.
    pub fn has_reserves(&self) -> bool {
        !self.reserve0.is_zero() && !self.reserve1.is_zero()
    }

    /// Reserves ordered as (in, out) relative to `token_in`.
    pub fn reserves_for(&self, token_in: Address) -> (U256, U256) {
        if token_in == self.token0.address {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    fn weights_for(&self, token_in: Address) -> Option<(u64, u64)> {
        match (self.weight0, self.weight1) {
            (Some(w0), Some(w1)) if token_in == self.token0.address => Some((w0, w1)),
            (Some(w0), Some(w1)) => Some((w1, w0)),
            _ => None,
        }
    }

    /// Spot price of token0 in token1, scaled by 10^18. Zero when reserve0
    /// is empty.
    pub fn spot_price(&self) -> U256 {
        dex_math::spot_price(self.reserve0, self.reserve1)
    }

    /// Local re-quote from the snapshot state. Returns zero whenever the
    /// inputs do not admit a quote (zero amount, empty reserves, unknown
    /// token, V3 snapshot).
    pub fn amount_out(&self, amount_in: U256, token_in: Address) -> U256 {
        if !self.contains(token_in) {
            return U256::zero();
        }
        let (reserve_in, reserve_out) = self.reserves_for(token_in);
        match self.weights_for(token_in) {
            Some((w_in, w_out)) if w_in != w_out => dex_math::weighted_amount_out(
                reserve_in, reserve_out, amount_in, w_in, w_out, self.fee,
            ),
            _ => dex_math::constant_product_out(reserve_in, reserve_out, amount_in, self.fee),
        }
    }
}

//================================================================================================//
//                                       ROUTES & QUOTES                                         //
//================================================================================================//

/// One swap step. Both token addresses appear in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub snapshot: PoolSnapshot,
    pub token_in: Address,
    pub token_out: Address,
}

/// A swap path. Consecutive hops chain: `hops[i].token_out ==
/// hops[i+1].token_in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub hops: Vec<Hop>,
    pub token_in: Token,
    pub token_out: Token,
    #[serde(with = "u256_dec")]
    pub amount_in: U256,
    #[serde(with = "u256_dec")]
    pub amount_out: U256,
    pub gas_estimate: u64,
}

impl Route {
    /// Whether consecutive hops link up token-for-token.
    pub fn chains(&self) -> bool {
        self.hops
            .windows(2)
            .all(|pair| pair[0].token_out == pair[1].token_in)
    }
}

/// One leg of a split order. Percentages across legs sum to 100 and the leg
/// inputs sum to the parent input (remainder carried into the last leg).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitLeg {
    pub route: Route,
    pub percentage: u64,
    #[serde(with = "u256_dec")]
    pub amount_in: U256,
    #[serde(with = "u256_dec")]
    pub amount_out: U256,
}

/// Aggregated quote handed to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub token_in: Token,
    pub token_out: Token,
    #[serde(with = "u256_dec")]
    pub amount_in: U256,
    #[serde(with = "u256_dec")]
    pub amount_out: U256,
    pub best_route: Route,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub split_legs: Vec<SplitLeg>,
    /// Price impact in basis points, 0..=10000.
    pub price_impact_bps: u64,
    #[serde(with = "u256_dec")]
    pub min_amount_out: U256,
    pub slippage_bps: u64,
    pub gas_estimate: u64,
    /// Every valid venue's output for the full input, as decimal strings.
    pub sources: BTreeMap<DexProtocol, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_warning: Option<String>,
}
