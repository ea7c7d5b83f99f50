//! # Router
//!
//! Ranks venue quotes, searches split-order compositions, annotates price
//! impact and slippage-protected minimum output, and estimates gas. The
//! router consumes the price service's fan-out results; it never talks to
//! the chain itself.

use ethers::types::U256;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::dex_math;
use crate::errors::RouterError;
use crate::price_service::{PriceService, VenueQuote};
use crate::types::{DexProtocol, Hop, PoolSnapshot, Quote, Route, SplitLeg, Token};

/// Applied when the caller passes zero slippage.
pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;

/// Impact threshold above which quotes carry a human-readable warning.
pub const PRICE_IMPACT_WARNING_BPS: u64 = 100;

pub const MAX_SLIPPAGE_BPS: u64 = 10_000;

const BASE_GAS: u64 = 21_000;
const GAS_PER_HOP: u64 = 100_000;
/// Flat estimate for a swap whose route shape is not yet known.
const DEFAULT_SWAP_GAS: u64 = 150_000;

/// Split ratios searched, in percent of the input to the first venue.
const SPLIT_RATIOS: [u64; 4] = [50, 60, 70, 80];

/// A venue quote that survived filtering: no error, positive output.
#[derive(Debug, Clone)]
struct ValidQuote {
    protocol: DexProtocol,
    snapshot: PoolSnapshot,
    amount_out: U256,
}

pub struct RouterService {
    prices: Arc<PriceService>,
}

impl RouterService {
    pub fn new(prices: Arc<PriceService>) -> Self {
        Self { prices }
    }

    /// `21000 + 100000 * hops`; a route of unknown shape costs the flat
    /// single-swap estimate.
    fn estimate_gas(hop_count: usize) -> u64 {
        if hop_count == 0 {
            DEFAULT_SWAP_GAS
        } else {
            BASE_GAS + GAS_PER_HOP * hop_count as u64
        }
    }

    /// Drops errored and zero-output venues, then sorts descending by
    /// output. The sort is stable, so equal outputs keep adapter-list order
    /// and quotes stay reproducible.
    fn filter_valid(quotes: Vec<VenueQuote>) -> Vec<ValidQuote> {
        let mut valid: Vec<ValidQuote> = quotes
            .into_iter()
            .filter_map(|venue| match venue.outcome {
                Ok(quote) if !quote.amount_out.is_zero() => Some(ValidQuote {
                    protocol: venue.protocol,
                    snapshot: quote.snapshot,
                    amount_out: quote.amount_out,
                }),
                _ => None,
            })
            .collect();
        valid.sort_by(|a, b| b.amount_out.cmp(&a.amount_out));
        valid
    }

    fn sources_of(valid: &[ValidQuote]) -> BTreeMap<DexProtocol, String> {
        valid
            .iter()
            .map(|q| (q.protocol, q.amount_out.to_string()))
            .collect()
    }

    fn single_route(
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        amount_out: U256,
        snapshot: PoolSnapshot,
    ) -> Route {
        Route {
            hops: vec![Hop {
                snapshot,
                token_in: token_in.address,
                token_out: token_out.address,
            }],
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in,
            amount_out,
            gas_estimate: Self::estimate_gas(1),
        }
    }

    /// Best single-venue quote, no slippage annotation. Building block for
    /// the multi-hop comparison.
    pub async fn get_quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        cancel: &CancellationToken,
    ) -> Result<Quote, RouterError> {
        let quotes = self
            .prices
            .get_prices(token_in, token_out, amount_in, cancel)
            .await;
        let valid = Self::filter_valid(quotes);
        let best = valid.first().cloned().ok_or(RouterError::NoRoute)?;

        let sources = Self::sources_of(&valid);
        let route = Self::single_route(
            token_in,
            token_out,
            amount_in,
            best.amount_out,
            best.snapshot,
        );
        let price_impact_bps = dex_math::route_price_impact(&route.hops, amount_in);
        let gas_estimate = route.gas_estimate;

        Ok(Quote {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in,
            amount_out: best.amount_out,
            best_route: route,
            split_legs: Vec::new(),
            price_impact_bps,
            min_amount_out: U256::zero(),
            slippage_bps: 0,
            gas_estimate,
            sources,
            price_warning: None,
        })
    }

    /// The full pipeline: rank venues, search splits, annotate impact,
    /// apply slippage protection, estimate gas.
    #[instrument(skip(self, cancel), fields(token_in = %token_in.symbol, token_out = %token_out.symbol, %amount_in, slippage_bps))]
    pub async fn get_smart_quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        slippage_bps: u64,
        cancel: &CancellationToken,
    ) -> Result<Quote, RouterError> {
        if slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(RouterError::InvalidSlippage(slippage_bps));
        }
        let slippage_bps = if slippage_bps == 0 {
            DEFAULT_SLIPPAGE_BPS
        } else {
            slippage_bps
        };

        let quotes = self
            .prices
            .get_prices(token_in, token_out, amount_in, cancel)
            .await;
        let valid = Self::filter_valid(quotes);
        if valid.is_empty() {
            return Err(RouterError::NoRoute);
        }

        let mut quote = self
            .try_split_order(token_in, token_out, amount_in, &valid)
            .unwrap_or_else(|| {
                let best = valid[0].clone();
                let route = Self::single_route(
                    token_in,
                    token_out,
                    amount_in,
                    best.amount_out,
                    best.snapshot,
                );
                let price_impact_bps = dex_math::route_price_impact(&route.hops, amount_in);
                let gas_estimate = route.gas_estimate;
                Quote {
                    token_in: token_in.clone(),
                    token_out: token_out.clone(),
                    amount_in,
                    amount_out: best.amount_out,
                    best_route: route,
                    split_legs: Vec::new(),
                    price_impact_bps,
                    min_amount_out: U256::zero(),
                    slippage_bps: 0,
                    gas_estimate,
                    sources: Self::sources_of(&valid),
                    price_warning: None,
                }
            });

        Self::apply_slippage_protection(&mut quote, slippage_bps);

        if quote.price_impact_bps > PRICE_IMPACT_WARNING_BPS {
            quote.price_warning = Some(format!(
                "High price impact: {}.{:02}%",
                quote.price_impact_bps / 100,
                quote.price_impact_bps % 100
            ));
        }

        Ok(quote)
    }

    /// Splits the input across the two best venues when both can be
    /// re-quoted locally, searching the fixed ratio grid. Adopted only when
    /// the combined output strictly beats the best single fill.
    fn try_split_order(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        valid: &[ValidQuote],
    ) -> Option<Quote> {
        if valid.len() < 2 {
            return None;
        }
        let first = &valid[0];
        let second = &valid[1];
        // Split evaluation re-quotes locally, which needs usable reserves on
        // both snapshots; a V3 leg cannot participate.
        if !first.snapshot.has_reserves() || !second.snapshot.has_reserves() {
            return None;
        }

        let hundred = U256::from(100u64);
        let mut best_split: Option<(u64, U256, U256, U256, U256)> = None;
        for ratio in SPLIT_RATIOS {
            let amount1 = amount_in * U256::from(ratio) / hundred;
            // Remainder rides on the second leg so the legs always sum to
            // the requested input.
            let amount2 = amount_in - amount1;
            let out1 = first.snapshot.amount_out(amount1, token_in.address);
            let out2 = second.snapshot.amount_out(amount2, token_in.address);
            let total = out1 + out2;

            if best_split
                .as_ref()
                .map_or(true, |(_, _, _, _, best_total)| total > *best_total)
            {
                best_split = Some((ratio, amount1, amount2, out1, total));
            }
        }

        let (ratio, amount1, amount2, out1, total) = best_split?;
        if total <= first.amount_out {
            return None;
        }
        let out2 = total - out1;
        debug!(ratio, %total, single = %first.amount_out, "split beats single venue");

        let leg1_route = Route {
            hops: vec![Hop {
                snapshot: first.snapshot.clone(),
                token_in: token_in.address,
                token_out: token_out.address,
            }],
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in: amount1,
            amount_out: out1,
            gas_estimate: Self::estimate_gas(0),
        };
        let leg2_route = Route {
            hops: vec![Hop {
                snapshot: second.snapshot.clone(),
                token_in: token_in.address,
                token_out: token_out.address,
            }],
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in: amount2,
            amount_out: out2,
            gas_estimate: Self::estimate_gas(0),
        };
        let split_legs = vec![
            SplitLeg {
                route: leg1_route,
                percentage: ratio,
                amount_in: amount1,
                amount_out: out1,
            },
            SplitLeg {
                route: leg2_route,
                percentage: 100 - ratio,
                amount_in: amount2,
                amount_out: out2,
            },
        ];

        let price_impact_bps = dex_math::split_price_impact(&split_legs);
        // Two swaps, plus the flat single-path overhead the gas model has
        // always charged a split.
        let gas_estimate = 2 * Self::estimate_gas(0) + Self::estimate_gas(0);

        Some(Quote {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in,
            amount_out: total,
            best_route: Self::single_route(
                token_in,
                token_out,
                amount_in,
                first.amount_out,
                first.snapshot.clone(),
            ),
            split_legs,
            price_impact_bps,
            min_amount_out: U256::zero(),
            slippage_bps: 0,
            gas_estimate,
            sources: Self::sources_of(valid),
            price_warning: None,
        })
    }

    /// Two-hop search through the configured intermediates, composing the
    /// best venue at each hop, compared against the direct quote.
    #[instrument(skip(self, intermediates, cancel), fields(token_in = %token_in.symbol, token_out = %token_out.symbol))]
    pub async fn get_multi_hop_quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        intermediates: &[Token],
        cancel: &CancellationToken,
    ) -> Result<Quote, RouterError> {
        let mut best = self
            .get_quote(token_in, token_out, amount_in, cancel)
            .await
            .ok();

        for mid in intermediates {
            if mid.address == token_in.address || mid.address == token_out.address {
                continue;
            }

            let Ok((_, leg1)) = self
                .prices
                .best_price(token_in, mid, amount_in, cancel)
                .await
            else {
                continue;
            };
            let Ok((_, leg2)) = self
                .prices
                .best_price(mid, token_out, leg1.amount_out, cancel)
                .await
            else {
                continue;
            };

            if leg2.amount_out.is_zero() {
                continue;
            }
            let improves = best
                .as_ref()
                .map_or(true, |q| leg2.amount_out > q.amount_out);
            if !improves {
                continue;
            }

            let hops = vec![
                Hop {
                    snapshot: leg1.snapshot,
                    token_in: token_in.address,
                    token_out: mid.address,
                },
                Hop {
                    snapshot: leg2.snapshot,
                    token_in: mid.address,
                    token_out: token_out.address,
                },
            ];
            let price_impact_bps = dex_math::route_price_impact(&hops, amount_in);
            let gas_estimate = Self::estimate_gas(hops.len());
            let route = Route {
                hops,
                token_in: token_in.clone(),
                token_out: token_out.clone(),
                amount_in,
                amount_out: leg2.amount_out,
                gas_estimate,
            };

            best = Some(Quote {
                token_in: token_in.clone(),
                token_out: token_out.clone(),
                amount_in,
                amount_out: route.amount_out,
                best_route: route,
                split_legs: Vec::new(),
                price_impact_bps,
                min_amount_out: U256::zero(),
                slippage_bps: 0,
                gas_estimate,
                sources: BTreeMap::new(),
                price_warning: None,
            });
        }

        best.ok_or(RouterError::NoRoute)
    }

    /// `minAmountOut = amountOut * (10000 - slippageBps) / 10000`, floored.
    fn apply_slippage_protection(quote: &mut Quote, slippage_bps: u64) {
        if quote.amount_out.is_zero() {
            return;
        }
        let multiplier = U256::from(MAX_SLIPPAGE_BPS - slippage_bps);
        quote.min_amount_out =
            quote.amount_out * multiplier / U256::from(MAX_SLIPPAGE_BPS);
        quote.slippage_bps = slippage_bps;
    }
}
