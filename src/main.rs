//! Application entry-point.
//!
//! 1. Read configuration from the environment, initialise tracing.
//! 2. Probe the RPC endpoint (chain id) — the only fatal failure.
//! 3. Pick the cache backend, falling back from Redis to in-process.
//! 4. Wire the venue adapters, price service and router, then serve the
//!    HTTP API until SIGINT/SIGTERM.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dex_aggregator::api::{self, AppState};
use dex_aggregator::blockchain::{ChainClient, RpcChainClient};
use dex_aggregator::cache::{MemoryCache, QuoteCache, RedisCache};
use dex_aggregator::config::AppConfig;
use dex_aggregator::dex::{
    BalancerClient, CurveClient, DexClient, UniswapV2Client, UniswapV3Client,
};
use dex_aggregator::price_service::PriceService;
use dex_aggregator::router::RouterService;
use dex_aggregator::token_registry::TokenRegistry;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let chain_client = Arc::new(
        RpcChainClient::connect(&config.rpc_url, config.chain.max_concurrent_calls).await?,
    );
    info!(chain_id = chain_client.chain_id(), "chain client ready");

    let cache: Arc<dyn QuoteCache> = match &config.redis_addr {
        Some(addr) => match RedisCache::connect(addr).await {
            Ok(redis) => {
                info!(%addr, "connected to Redis cache");
                Arc::new(redis)
            }
            Err(e) => {
                warn!(%addr, error = %e, "Redis unavailable, using in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            info!("using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let registry = Arc::new(TokenRegistry::mainnet_defaults());

    let chain = &config.chain;
    let clients: Vec<Arc<dyn DexClient>> = vec![
        Arc::new(UniswapV2Client::new(
            chain_client.clone(),
            chain.uniswap_v2_factory,
        )),
        Arc::new(UniswapV3Client::new(
            chain_client.clone(),
            chain.uniswap_v3_factory,
            chain.uniswap_v3_quoter,
            chain.v3_fee_tiers.clone(),
        )),
        Arc::new(UniswapV2Client::sushiswap(
            chain_client.clone(),
            chain.sushiswap_factory,
        )),
        Arc::new(CurveClient::new(
            chain_client.clone(),
            chain.curve_pools.clone(),
        )),
        Arc::new(BalancerClient::new(
            chain_client.clone(),
            chain.balancer_vault,
            chain.balancer_pools.clone(),
        )),
    ];
    info!(venues = clients.len(), "venue adapters wired");

    let prices = Arc::new(PriceService::new(
        clients,
        cache,
        chain.cache_ttl(),
        registry.resolve(chain.usd_stable),
        registry.resolve(chain.wrapped_native),
    ));
    let router = Arc::new(RouterService::new(prices.clone()));

    let state = AppState {
        router,
        prices,
        registry,
        request_timeout: chain.request_timeout(),
    };

    api::serve(state, config.port).await?;
    info!("server stopped");
    Ok(())
}
