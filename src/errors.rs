//! # Centralized Error Handling
//!
//! One typed error enum per subsystem. Venue-level failures (`DexError`)
//! never escape the price service; they are folded into per-venue results and
//! only the aggregate `RouterError::NoRoute` surfaces to callers. Cache
//! failures are logged and ignored on the request path.

use ethers::types::Address;
use thiserror::Error;

/// Errors from the chain client and the underlying RPC transport.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("RPC endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("chain call to {to} failed: {message}")]
    CallFailed { to: Address, message: String },
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Errors from ABI packing and return-data decoding.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: need {need} bytes, have {have}")]
    ShortReturnData { need: usize, have: usize },
    #[error("dynamic offset {offset} out of bounds for buffer of {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },
    #[error("dynamic array length {len} overflows buffer")]
    LengthOutOfBounds { len: usize },
}

/// Per-venue quote failures. Always recoverable: the venue is skipped.
#[derive(Error, Debug)]
pub enum DexError {
    #[error("pair does not exist")]
    PairNotFound,
    #[error("no pool found for token pair")]
    PoolNotFound,
    #[error("token {0} not found in pool")]
    TokenNotInPool(Address),
    #[error("ABI decode failed: {0}")]
    Abi(#[from] AbiError),
    #[error("chain call failed: {0}")]
    Blockchain(#[from] BlockchainError),
    #[error("venue returned no usable quote")]
    NoQuote,
}

/// Cache backend failures. Never fatal to a request.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(String),
    #[error("cache value could not be decoded: {0}")]
    Codec(String),
}

/// USD pricing failures.
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("unable to determine price for token {0}")]
    Unpriceable(String),
}

/// Routing failures surfaced to the API layer.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no valid routes found")]
    NoRoute,
    #[error("slippage must be 0-10000 basis points, got {0}")]
    InvalidSlippage(u64),
}
