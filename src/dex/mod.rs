//! # Venue Adapters
//!
//! One adapter per venue family behind the [`DexClient`] contract. Venues
//! differ in where the price comes from: V2-family and Balancer pools are
//! read as balances and priced locally, V3 and Curve are quoted by the
//! contract itself. Adapter failures are structured errors, never fatal to
//! the request; the price service turns them into "no quote from this
//! venue".

pub mod balancer;
pub mod curve;
pub mod uniswap_v2;
pub mod uniswap_v3;

pub use balancer::BalancerClient;
pub use curve::CurveClient;
pub use uniswap_v2::UniswapV2Client;
pub use uniswap_v3::UniswapV3Client;

use async_trait::async_trait;
use ethers::types::U256;
use tokio_util::sync::CancellationToken;

use crate::errors::DexError;
use crate::types::{DexProtocol, PoolSnapshot, Token};

/// A successful venue quote: the pool state observed and the output it
/// implies for the requested input.
#[derive(Debug, Clone)]
pub struct PoolQuote {
    pub snapshot: PoolSnapshot,
    pub amount_out: U256,
}

/// Contract every venue adapter satisfies.
#[async_trait]
pub trait DexClient: Send + Sync {
    fn protocol(&self) -> DexProtocol;

    /// Discovers the pool serving the pair, reads its state, and computes
    /// the output for `amount_in`. The request's cancellation token is
    /// propagated into every chain call the adapter issues.
    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError>;
}

/// Orders a token pair by address, the shared pool convention.
pub(crate) fn sort_token_pair(a: &Token, b: &Token) -> (Token, Token) {
    if a.address < b.address {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Snapshot observation timestamp, unix seconds.
pub(crate) fn observed_at() -> i64 {
    chrono::Utc::now().timestamp()
}
