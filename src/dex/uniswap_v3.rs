//! Uniswap V3: concentrated liquidity, so reserves mean nothing locally.
//! Every fee tier with an existing pool is quoted through the QuoterV2
//! simulator contract and the best tier wins. The resulting snapshot carries
//! zero reserves to mark it remote-quote-only.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abi::{self, selectors, CallBuilder};
use crate::blockchain::ChainClient;
use crate::dex::{observed_at, sort_token_pair, DexClient, PoolQuote};
use crate::errors::{BlockchainError, DexError};
use crate::types::{DexProtocol, PoolSnapshot, Token};

pub struct UniswapV3Client {
    client: Arc<dyn ChainClient>,
    factory: Address,
    quoter: Address,
    /// Fee tiers in 1/1_000_000 units.
    fee_tiers: Vec<u32>,
}

impl UniswapV3Client {
    pub fn new(
        client: Arc<dyn ChainClient>,
        factory: Address,
        quoter: Address,
        fee_tiers: Vec<u32>,
    ) -> Self {
        Self {
            client,
            factory,
            quoter,
            fee_tiers,
        }
    }

    async fn pool_for_tier(
        &self,
        token0: Address,
        token1: Address,
        fee: u32,
        cancel: &CancellationToken,
    ) -> Result<Address, DexError> {
        let data = CallBuilder::new(selectors::V3_GET_POOL)
            .address(token0)
            .address(token1)
            .uint24(fee)
            .build();
        let ret = self.client.call(self.factory, data, cancel).await?;
        Ok(abi::decode_address(&ret, 0)?)
    }

    /// `quoteExactInputSingle` takes the unsorted pair in trade direction;
    /// `sqrtPriceLimitX96 = 0` disables the price limit. Only the leading
    /// `amountOut` word of the multi-return is consumed.
    async fn quote_tier(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
        cancel: &CancellationToken,
    ) -> Result<U256, DexError> {
        let data = CallBuilder::new(selectors::V3_QUOTE_EXACT_INPUT_SINGLE)
            .address(token_in)
            .address(token_out)
            .uint256(amount_in)
            .uint24(fee)
            .uint256(U256::zero())
            .build();
        let ret = self.client.call(self.quoter, data, cancel).await?;
        Ok(abi::decode_u256(&ret, 0)?)
    }
}

#[async_trait]
impl DexClient for UniswapV3Client {
    fn protocol(&self) -> DexProtocol {
        DexProtocol::UniswapV3
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError> {
        let (token0, token1) = sort_token_pair(token_in, token_out);

        let mut best: Option<(u32, Address, U256)> = None;
        for &fee in &self.fee_tiers {
            // Tier failures are skipped, but a fired deadline must not be
            // mistaken for one and walk the remaining tiers.
            if cancel.is_cancelled() {
                return Err(DexError::Blockchain(BlockchainError::DeadlineExceeded));
            }
            let pool = match self
                .pool_for_tier(token0.address, token1.address, fee, cancel)
                .await
            {
                Ok(pool) if !pool.is_zero() => pool,
                _ => continue,
            };
            let amount_out = match self
                .quote_tier(token_in.address, token_out.address, amount_in, fee, cancel)
                .await
            {
                Ok(out) => out,
                Err(_) => continue,
            };
            debug!(fee, %pool, %amount_out, "V3 tier quoted");
            if best.as_ref().map_or(true, |(_, _, prev)| amount_out > *prev) {
                best = Some((fee, pool, amount_out));
            }
        }

        let (fee, pool, amount_out) = best.ok_or(DexError::NoQuote)?;

        Ok(PoolQuote {
            snapshot: PoolSnapshot {
                address: pool,
                token0,
                token1,
                // Concentrated liquidity: no local re-quote is possible.
                reserve0: U256::zero(),
                reserve1: U256::zero(),
                weight0: None,
                weight1: None,
                dex: DexProtocol::UniswapV3,
                fee: fee as u64,
                updated_at: observed_at(),
            },
            amount_out,
        })
    }
}
