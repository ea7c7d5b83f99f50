//! Uniswap V2 family: factory-discovered pairs priced locally from
//! reserves. Sushiswap and other clones reuse the same byte-compatible
//! interface with a different factory address.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abi::{self, selectors, CallBuilder};
use crate::blockchain::ChainClient;
use crate::dex::{observed_at, sort_token_pair, DexClient, PoolQuote};
use crate::errors::DexError;
use crate::types::{DexProtocol, PoolSnapshot, Token};

/// Swap fee every V2-family pair charges, in basis points.
const V2_FEE_BPS: u64 = 30;

pub struct UniswapV2Client {
    client: Arc<dyn ChainClient>,
    factory: Address,
    protocol: DexProtocol,
}

impl UniswapV2Client {
    pub fn new(client: Arc<dyn ChainClient>, factory: Address) -> Self {
        Self {
            client,
            factory,
            protocol: DexProtocol::UniswapV2,
        }
    }

    /// Sushiswap speaks the identical ABI against its own factory.
    pub fn sushiswap(client: Arc<dyn ChainClient>, factory: Address) -> Self {
        Self {
            client,
            factory,
            protocol: DexProtocol::Sushiswap,
        }
    }

    async fn pair_address(
        &self,
        token0: Address,
        token1: Address,
        cancel: &CancellationToken,
    ) -> Result<Address, DexError> {
        let data = CallBuilder::new(selectors::V2_GET_PAIR)
            .address(token0)
            .address(token1)
            .build();
        let ret = self.client.call(self.factory, data, cancel).await?;
        let pair = abi::decode_address(&ret, 0)?;
        if pair.is_zero() {
            return Err(DexError::PairNotFound);
        }
        Ok(pair)
    }

    /// `getReserves()` returns `(uint112, uint112, uint32)`; only the two
    /// reserve words matter here.
    async fn reserves(
        &self,
        pair: Address,
        cancel: &CancellationToken,
    ) -> Result<(U256, U256), DexError> {
        let data = CallBuilder::new(selectors::V2_GET_RESERVES).build();
        let ret = self.client.call(pair, data, cancel).await?;
        let reserve0 = abi::decode_u256(&ret, 0)?;
        let reserve1 = abi::decode_u256(&ret, 1)?;
        Ok((reserve0, reserve1))
    }
}

#[async_trait]
impl DexClient for UniswapV2Client {
    fn protocol(&self) -> DexProtocol {
        self.protocol
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<PoolQuote, DexError> {
        let (token0, token1) = sort_token_pair(token_in, token_out);

        let pair = self
            .pair_address(token0.address, token1.address, cancel)
            .await?;
        let (reserve0, reserve1) = self.reserves(pair, cancel).await?;
        debug!(venue = %self.protocol, %pair, %reserve0, %reserve1, "fetched pair state");

        let snapshot = PoolSnapshot {
            address: pair,
            token0,
            token1,
            reserve0,
            reserve1,
            weight0: None,
            weight1: None,
            dex: self.protocol,
            fee: V2_FEE_BPS,
            updated_at: observed_at(),
        };
        let amount_out = snapshot.amount_out(amount_in, token_in.address);

        Ok(PoolQuote {
            snapshot,
            amount_out,
        })
    }
}
