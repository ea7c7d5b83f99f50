//! Balancer weighted pools. Pool ids, member coins, weights and swap fees
//! come from the configured pool table; live balances come from the vault's
//! `getPoolTokens`. The weighted output is computed locally and the snapshot
//! keeps only the two tokens involved, dropping the rest of the pool.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abi::{self, selectors, CallBuilder};
use crate::blockchain::ChainClient;
use crate::config::BalancerPoolConfig;
use crate::dex::{observed_at, DexClient, PoolQuote};
use crate::dex_math;
use crate::errors::DexError;
use crate::types::{DexProtocol, PoolSnapshot, Token};

pub struct BalancerClient {
    client: Arc<dyn ChainClient>,
    vault: Address,
    pools: Vec<BalancerPoolConfig>,
}

impl BalancerClient {
    pub fn new(
        client: Arc<dyn ChainClient>,
        vault: Address,
        pools: Vec<BalancerPoolConfig>,
    ) -> Self {
        Self {
            client,
            vault,
            pools,
        }
    }

    fn find_pool(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Option<(&BalancerPoolConfig, usize, usize)> {
        for pool in &self.pools {
            let idx_a = pool.tokens.iter().position(|&t| t == token_a);
            let idx_b = pool.tokens.iter().position(|&t| t == token_b);
            if let (Some(i), Some(j)) = (idx_a, idx_b) {
                return Some((pool, i, j));
            }
        }
        None
    }

    /// `getPoolTokens` returns `(address[] tokens, uint256[] balances,
    /// uint256 lastChangeBlock)`; only the balances array is consumed.
    async fn pool_balances(
        &self,
        pool_id: [u8; 32],
        cancel: &CancellationToken,
    ) -> Result<Vec<U256>, DexError> {
        let data = CallBuilder::new(selectors::BALANCER_GET_POOL_TOKENS)
            .bytes32(pool_id)
            .build();
        let ret = self.client.call(self.vault, data, cancel).await?;
        Ok(abi::decode_u256_array(&ret, 1)?)
    }
}

#[async_trait]
impl DexClient for BalancerClient {
    fn protocol(&self) -> DexProtocol {
        DexProtocol::Balancer
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError> {
        let (pool, idx_in, idx_out) = self
            .find_pool(token_in.address, token_out.address)
            .ok_or(DexError::PoolNotFound)?;

        let balances = self.pool_balances(pool.pool_id.0, cancel).await?;
        if idx_in >= balances.len() || idx_out >= balances.len() {
            return Err(DexError::TokenNotInPool(token_in.address));
        }

        let balance_in = balances[idx_in];
        let balance_out = balances[idx_out];
        let weight_in = pool.weights[idx_in];
        let weight_out = pool.weights[idx_out];

        let amount_out = dex_math::weighted_amount_out(
            balance_in,
            balance_out,
            amount_in,
            weight_in,
            weight_out,
            pool.swap_fee_bps,
        );
        debug!(pool = %pool.address, %amount_out, weight_in, weight_out, "balancer pool quoted");

        let in_first = token_in.address < token_out.address;
        let (token0, token1) = if in_first {
            (token_in.clone(), token_out.clone())
        } else {
            (token_out.clone(), token_in.clone())
        };
        let (reserve0, reserve1) = if in_first {
            (balance_in, balance_out)
        } else {
            (balance_out, balance_in)
        };
        let (weight0, weight1) = if in_first {
            (weight_in, weight_out)
        } else {
            (weight_out, weight_in)
        };

        Ok(PoolQuote {
            snapshot: PoolSnapshot {
                address: pool.address,
                token0,
                token1,
                reserve0,
                reserve1,
                weight0: Some(weight0),
                weight1: Some(weight1),
                dex: DexProtocol::Balancer,
                fee: pool.swap_fee_bps,
                updated_at: observed_at(),
            },
            amount_out,
        })
    }
}
