//! Curve stable pools. The pool table is static configuration; a pair is
//! served when both coins appear in one pool's ordered coin list. The pool
//! contract computes the stable-swap output via `get_dy`; balances are read
//! only to enrich the snapshot.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abi::{self, selectors, CallBuilder};
use crate::blockchain::ChainClient;
use crate::config::CurvePoolConfig;
use crate::dex::{observed_at, DexClient, PoolQuote};
use crate::errors::DexError;
use crate::types::{DexProtocol, PoolSnapshot, Token};

/// Fallback fee for stable pools whose `fee()` call fails, in basis points.
const DEFAULT_STABLE_FEE_BPS: u64 = 4;

/// Curve reports fees scaled by 1e10; dividing by 1e6 yields basis points.
const CURVE_FEE_TO_BPS_DIVISOR: u64 = 1_000_000;

pub struct CurveClient {
    client: Arc<dyn ChainClient>,
    pools: Vec<CurvePoolConfig>,
}

impl CurveClient {
    pub fn new(client: Arc<dyn ChainClient>, pools: Vec<CurvePoolConfig>) -> Self {
        Self { client, pools }
    }

    /// The first configured pool containing both coins, with their indices.
    fn find_pool(&self, token_a: Address, token_b: Address) -> Option<(&CurvePoolConfig, i128, i128)> {
        for pool in &self.pools {
            let idx_a = pool.coins.iter().position(|&c| c == token_a);
            let idx_b = pool.coins.iter().position(|&c| c == token_b);
            if let (Some(i), Some(j)) = (idx_a, idx_b) {
                return Some((pool, i as i128, j as i128));
            }
        }
        None
    }

    async fn get_dy(
        &self,
        pool: Address,
        i: i128,
        j: i128,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<U256, DexError> {
        let data = CallBuilder::new(selectors::CURVE_GET_DY)
            .int128(i)
            .int128(j)
            .uint256(amount_in)
            .build();
        let ret = self.client.call(pool, data, cancel).await?;
        Ok(abi::decode_u256(&ret, 0)?)
    }

    /// Both coin balances in one bounded-concurrency batch.
    async fn balances(
        &self,
        pool: Address,
        i: i128,
        j: i128,
        cancel: &CancellationToken,
    ) -> Result<(U256, U256), DexError> {
        let call_for = |index: i128| {
            CallBuilder::new(selectors::CURVE_BALANCES)
                .uint256(U256::from(index as u64))
                .build()
        };
        let mut results = self
            .client
            .batch_call(vec![(pool, call_for(i)), (pool, call_for(j))], cancel)
            .await;
        let ret_j = results.pop().ok_or(DexError::NoQuote)??;
        let ret_i = results.pop().ok_or(DexError::NoQuote)??;
        Ok((abi::decode_u256(&ret_i, 0)?, abi::decode_u256(&ret_j, 0)?))
    }

    async fn fee_bps(&self, pool: Address, cancel: &CancellationToken) -> u64 {
        let data = CallBuilder::new(selectors::CURVE_FEE).build();
        match self.client.call(pool, data, cancel).await {
            Ok(ret) => match abi::decode_u256(&ret, 0) {
                Ok(raw) => {
                    let bps = raw / U256::from(CURVE_FEE_TO_BPS_DIVISOR);
                    if bps > U256::from(u64::MAX) {
                        DEFAULT_STABLE_FEE_BPS
                    } else {
                        bps.as_u64()
                    }
                }
                Err(_) => DEFAULT_STABLE_FEE_BPS,
            },
            Err(_) => DEFAULT_STABLE_FEE_BPS,
        }
    }
}

#[async_trait]
impl DexClient for CurveClient {
    fn protocol(&self) -> DexProtocol {
        DexProtocol::Curve
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError> {
        let (pool, i, j) = self
            .find_pool(token_in.address, token_out.address)
            .ok_or(DexError::PoolNotFound)?;

        let amount_out = self.get_dy(pool.address, i, j, amount_in, cancel).await?;
        let (balance_in, balance_out) = self.balances(pool.address, i, j, cancel).await?;
        let fee = self.fee_bps(pool.address, cancel).await;
        debug!(pool = %pool.address, %amount_out, fee, "curve get_dy quoted");

        // Snapshot tokens in canonical order, balances following suit.
        let (token0, token1, reserve0, reserve1) = if token_in.address < token_out.address {
            (token_in.clone(), token_out.clone(), balance_in, balance_out)
        } else {
            (token_out.clone(), token_in.clone(), balance_out, balance_in)
        };

        Ok(PoolQuote {
            snapshot: PoolSnapshot {
                address: pool.address,
                token0,
                token1,
                reserve0,
                reserve1,
                weight0: None,
                weight1: None,
                dex: DexProtocol::Curve,
                fee,
                updated_at: observed_at(),
            },
            amount_out,
        })
    }
}
