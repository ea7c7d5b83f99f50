//! # Chain Client
//!
//! A thin, read-only interface to an EVM-compatible node. The aggregator
//! issues exactly two RPC methods: `eth_chainId` once at startup and
//! `eth_call` at the latest block for everything else. Concurrency across
//! all in-flight calls is capped by a counting semaphore. Every operation
//! takes the request's cancellation token and races it against both the
//! permit wait and the RPC round trip, so a deadline reached mid-batch
//! aborts the calls still outstanding instead of letting them run to
//! completion.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::BlockchainError;

/// Default cap on concurrent RPC calls.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 10;

/// Read-only access to the chain. Implementations must be safe to share
/// across request tasks.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Chain id, probed once at construction.
    fn chain_id(&self) -> u64;

    /// One read-only contract call at the latest block. Returns
    /// [`BlockchainError::DeadlineExceeded`] as soon as `cancel` fires,
    /// aborting the in-flight request.
    async fn call(
        &self,
        to: Address,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<Bytes, BlockchainError>;

    /// Fans the calls out concurrently (bounded by the implementation's
    /// semaphore) and returns one result per call, in call order. A failed
    /// call never poisons its neighbours; a fired deadline cancels every
    /// call still outstanding while results already received are returned
    /// as-is.
    async fn batch_call(
        &self,
        calls: Vec<(Address, Bytes)>,
        cancel: &CancellationToken,
    ) -> Vec<Result<Bytes, BlockchainError>> {
        join_all(
            calls
                .into_iter()
                .map(|(to, data)| self.call(to, data, cancel)),
        )
        .await
    }
}

/// `ChainClient` over an HTTP JSON-RPC provider.
#[derive(Debug)]
pub struct RpcChainClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
    semaphore: Arc<Semaphore>,
}

impl RpcChainClient {
    /// Connects and probes the chain id. Failure here is the one fatal error
    /// in the system: a node that cannot answer `eth_chainId` cannot serve
    /// quotes either.
    pub async fn connect(
        rpc_url: &str,
        max_concurrent_calls: usize,
    ) -> Result<Self, BlockchainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| BlockchainError::Unreachable(e.to_string()))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| BlockchainError::Unreachable(e.to_string()))?;

        info!(chain_id = %chain_id, rpc_url, "connected to RPC endpoint");

        Ok(Self {
            provider: Arc::new(provider),
            chain_id: chain_id.as_u64(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<Bytes, BlockchainError> {
        // An expired deadline must not keep queueing behind the semaphore.
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BlockchainError::DeadlineExceeded),
            permit = self.semaphore.acquire() => {
                permit.map_err(|e| BlockchainError::Provider(e.to_string()))?
            }
        };

        debug!(%to, data_len = data.len(), "eth_call");
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BlockchainError::DeadlineExceeded),
            result = self.provider.call(&tx, None) => {
                result.map_err(|e| BlockchainError::CallFailed {
                    to,
                    message: e.to_string(),
                })
            }
        }
    }
}
