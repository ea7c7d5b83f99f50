//! Read-only price aggregator across on-chain swap venues.
//!
//! The crate quotes a token swap against a fixed set of venues (Uniswap
//! V2/V3, Sushiswap, Curve, Balancer), picks the best route, and optionally
//! splits the order across two venues when that strictly beats the best
//! single fill. Nothing here signs or submits transactions; every chain
//! interaction is a read-only `eth_call`.

pub mod abi;
pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod dex;
pub mod dex_math;
pub mod errors;
pub mod price_service;
pub mod router;
pub mod token_registry;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
