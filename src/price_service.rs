//! # Price Service
//!
//! Concurrent price fan-out: one task per configured venue adapter, joined
//! before return, with the result vector in adapter-list order so ranking
//! and `sources` are reproducible. Each task consults the cache first; a
//! fresh snapshot with usable reserves is re-quoted locally, anything else
//! (miss, expired, V3 snapshot) goes to the adapter. Venue failures are
//! data, not errors.
//!
//! Every fan-out carries the request's cancellation token: the token is
//! propagated into each adapter's chain calls and each spawned task races
//! it, so a cancelled request tears down its in-flight venue work instead
//! of leaving detached tasks running to completion.
//!
//! USD pricing lives here too: prices are anchored on the configured stable
//! and fall back to a hop through wrapped-native.

use ethers::types::{U256, U512};
use futures::future::{join_all, BoxFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::cache::{self, QuoteCache};
use crate::dex::{DexClient, PoolQuote};
use crate::errors::{BlockchainError, DexError, PriceError, RouterError};
use crate::types::{DexProtocol, Token};

/// One venue's answer in the fan-out.
#[derive(Debug)]
pub struct VenueQuote {
    pub protocol: DexProtocol,
    pub outcome: Result<PoolQuote, DexError>,
}

impl VenueQuote {
    /// The quote, if the venue produced one.
    pub fn ok(&self) -> Option<&PoolQuote> {
        self.outcome.as_ref().ok()
    }
}

pub struct PriceService {
    clients: Vec<Arc<dyn DexClient>>,
    cache: Arc<dyn QuoteCache>,
    cache_ttl: Duration,
    usd_stable: Token,
    wrapped_native: Token,
}

impl PriceService {
    pub fn new(
        clients: Vec<Arc<dyn DexClient>>,
        cache: Arc<dyn QuoteCache>,
        cache_ttl: Duration,
        usd_stable: Token,
        wrapped_native: Token,
    ) -> Self {
        Self {
            clients,
            cache,
            cache_ttl,
            usd_stable,
            wrapped_native,
        }
    }

    /// Quotes every venue in parallel. The result preserves adapter-list
    /// order and always has one entry per configured venue; a fired
    /// deadline turns the venues still in flight into per-venue errors.
    #[instrument(skip(self, cancel), fields(token_in = %token_in.symbol, token_out = %token_out.symbol, %amount_in))]
    pub async fn get_prices(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Vec<VenueQuote> {
        let mut tasks = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let client = Arc::clone(client);
            let cache = Arc::clone(&self.cache);
            let cache_ttl = self.cache_ttl;
            let token_in = token_in.clone();
            let token_out = token_out.clone();
            let cancel = cancel.clone();

            tasks.push(tokio::spawn(async move {
                let protocol = client.protocol();
                let work = async {
                    let key = cache::pool_key(protocol, token_in.address, token_out.address);

                    // Cache hit with usable reserves: re-quote locally. V3
                    // snapshots carry zero reserves and fall through to the
                    // adapter.
                    match cache.get_pool(&key).await {
                        Ok(Some(snapshot)) if snapshot.has_reserves() => {
                            let amount_out = snapshot.amount_out(amount_in, token_in.address);
                            debug!(venue = %protocol, %amount_out, "served from cached snapshot");
                            return VenueQuote {
                                protocol,
                                outcome: Ok(PoolQuote {
                                    snapshot,
                                    amount_out,
                                }),
                            };
                        }
                        Ok(_) => {}
                        Err(e) => warn!(venue = %protocol, error = %e, "cache read failed"),
                    }

                    let outcome = client.quote(&token_in, &token_out, amount_in, &cancel).await;
                    if let Ok(quote) = &outcome {
                        if let Err(e) = cache.set_pool(&key, &quote.snapshot, cache_ttl).await {
                            warn!(venue = %protocol, error = %e, "cache write failed");
                        }
                    }
                    VenueQuote { protocol, outcome }
                };

                // The race makes the task exit promptly once the request is
                // cancelled, even if it is parked on a cache or chain await.
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => VenueQuote {
                        protocol,
                        outcome: Err(DexError::Blockchain(BlockchainError::DeadlineExceeded)),
                    },
                    venue = work => venue,
                }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (client, joined) in self.clients.iter().zip(join_all(tasks).await) {
            results.push(joined.unwrap_or_else(|e| VenueQuote {
                protocol: client.protocol(),
                outcome: Err(DexError::Blockchain(BlockchainError::Provider(format!(
                    "venue task failed: {}",
                    e
                )))),
            }));
        }
        results
    }

    /// The single best positive quote across venues.
    pub async fn best_price(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<(DexProtocol, PoolQuote), RouterError> {
        let quotes = self
            .get_prices(token_in, token_out, amount_in, cancel)
            .await;
        let mut best: Option<(DexProtocol, PoolQuote)> = None;
        for venue in quotes {
            if let Ok(quote) = venue.outcome {
                if quote.amount_out.is_zero() {
                    continue;
                }
                // Strict comparison keeps the earliest venue on ties, so the
                // winner is stable across runs.
                if best
                    .as_ref()
                    .map_or(true, |(_, b)| quote.amount_out > b.amount_out)
                {
                    best = Some((venue.protocol, quote));
                }
            }
        }
        best.ok_or(RouterError::NoRoute)
    }

    /// Token price in USD as 18-decimal fixed point.
    ///
    /// The stable anchor prices at exactly 10^18. Other tokens take the best
    /// direct `token -> stable` quote for one whole unit; failing that, the
    /// price is composed through wrapped-native. Results are memoised in the
    /// price cache as decimal strings.
    pub fn token_price_usd<'a>(
        &'a self,
        token: &'a Token,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<U256, PriceError>> {
        Box::pin(async move {
            let one_usd = U256::exp10(18);
            if token.address == self.usd_stable.address {
                return Ok(one_usd);
            }

            let key = cache::price_key(token.address);
            if let Ok(Some(cached)) = self.cache.get_price(&key).await {
                if let Ok(price) = U256::from_dec_str(&cached) {
                    return Ok(price);
                }
            }

            let price = self.uncached_price_usd(token, cancel).await?;

            if let Err(e) = self
                .cache
                .set_price(&key, &price.to_string(), self.cache_ttl)
                .await
            {
                warn!(token = %token.symbol, error = %e, "price cache write failed");
            }
            Ok(price)
        })
    }

    async fn uncached_price_usd(
        &self,
        token: &Token,
        cancel: &CancellationToken,
    ) -> Result<U256, PriceError> {
        let one_unit = token.one_unit();

        // Direct pair against the stable.
        if let Ok((_, quote)) = self
            .best_price(token, &self.usd_stable, one_unit, cancel)
            .await
        {
            if !quote.amount_out.is_zero() {
                let scale = U256::exp10(18usize.saturating_sub(self.usd_stable.decimals as usize));
                return quote
                    .amount_out
                    .checked_mul(scale)
                    .ok_or_else(|| PriceError::Unpriceable(token.symbol.clone()));
            }
        }

        // Hop through wrapped-native: price = (token/native) * (native/USD).
        if token.address != self.wrapped_native.address {
            let (_, native_leg) = self
                .best_price(token, &self.wrapped_native, one_unit, cancel)
                .await
                .map_err(|_| PriceError::Unpriceable(token.symbol.clone()))?;
            let native_usd = self.token_price_usd(&self.wrapped_native, cancel).await?;

            let scaled = U512::from(native_leg.amount_out) * U512::from(native_usd)
                / U512::from(U256::exp10(18));
            return U256::try_from(scaled)
                .map_err(|_| PriceError::Unpriceable(token.symbol.clone()));
        }

        Err(PriceError::Unpriceable(token.symbol.clone()))
    }
}
