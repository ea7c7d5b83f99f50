//! # Pool Math
//!
//! Pure pricing functions shared by every venue adapter and the router. All
//! quantities are non-negative `U256` values; intermediate products are
//! computed in `U512` so no multiplication can overflow, and every division
//! floors. Functions return zero instead of erroring when preconditions do
//! not hold: an unquotable state is "no output", never a panic.

use ethers::types::{U256, U512};

use crate::types::{Hop, SplitLeg};

/// Fee denominator: 10000 basis points = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point scale for spot prices and weighted-pool ratios.
pub fn precision() -> U256 {
    U256::exp10(18)
}

/// Probe input for spot-amount simulation: 10^15, one thousandth of an
/// 18-decimals token. Small enough to approximate the marginal price, large
/// enough to survive integer flooring in realistic pools.
pub fn spot_probe() -> U256 {
    U256::exp10(15)
}

fn to_u256_or_zero(value: U512) -> U256 {
    U256::try_from(value).unwrap_or_else(|_| U256::zero())
}

//================================================================================================//
//                                     CONSTANT-PRODUCT MATH                                     //
//================================================================================================//

/// `amountOut` on an `x·y = k` pool with the fee taken from the input:
///
/// ```text
/// amountInAfterFee = amountIn * (10000 - feeBps)
/// amountOut        = amountInAfterFee * reserveOut
///                  / (reserveIn * 10000 + amountInAfterFee)
/// ```
///
/// Returns zero for empty reserves, zero input, or a fee at or above 100%.
pub fn constant_product_out(
    reserve_in: U256,
    reserve_out: U256,
    amount_in: U256,
    fee_bps: u64,
) -> U256 {
    if amount_in.is_zero()
        || reserve_in.is_zero()
        || reserve_out.is_zero()
        || fee_bps >= BPS_DENOMINATOR
    {
        return U256::zero();
    }

    let amount_in_with_fee = U512::from(amount_in) * U512::from(BPS_DENOMINATOR - fee_bps);
    let numerator = match amount_in_with_fee.checked_mul(U512::from(reserve_out)) {
        Some(n) => n,
        None => return U256::zero(),
    };
    let denominator = U512::from(reserve_in) * U512::from(BPS_DENOMINATOR) + amount_in_with_fee;

    // amountOut < reserveOut, so the quotient always fits back into U256.
    to_u256_or_zero(numerator / denominator)
}

//================================================================================================//
//                                      WEIGHTED-POOL MATH                                       //
//================================================================================================//

/// `amountOut` on a weighted pool, Balancer-style.
///
/// Equal weights reduce to the constant-product curve. Unequal weights use
/// the linear approximation
///
/// ```text
/// ratio     = amountInAfterFee * 10^18 / balanceIn
/// amountOut = balanceOut * ratio * (weightIn * 10^18 / weightOut) / 10^36
/// ```
///
/// of the exact power formula, valid for inputs small relative to
/// `balanceIn`. The fee is floored off the input first.
pub fn weighted_amount_out(
    balance_in: U256,
    balance_out: U256,
    amount_in: U256,
    weight_in: u64,
    weight_out: u64,
    fee_bps: u64,
) -> U256 {
    if amount_in.is_zero()
        || balance_in.is_zero()
        || balance_out.is_zero()
        || weight_in == 0
        || weight_out == 0
        || fee_bps >= BPS_DENOMINATOR
    {
        return U256::zero();
    }

    let after_fee = U512::from(amount_in) * U512::from(BPS_DENOMINATOR - fee_bps)
        / U512::from(BPS_DENOMINATOR);

    if weight_in == weight_out {
        let numerator = match after_fee.checked_mul(U512::from(balance_out)) {
            Some(n) => n,
            None => return U256::zero(),
        };
        let denominator = U512::from(balance_in) + after_fee;
        return to_u256_or_zero(numerator / denominator);
    }

    let precision = U512::from(precision());
    let ratio = match after_fee.checked_mul(precision) {
        Some(r) => r / U512::from(balance_in),
        None => return U256::zero(),
    };
    let weight_ratio = U512::from(weight_in) * precision / U512::from(weight_out);

    let scaled = match U512::from(balance_out)
        .checked_mul(ratio)
        .and_then(|v| v.checked_mul(weight_ratio))
    {
        Some(v) => v,
        None => return U256::zero(),
    };
    to_u256_or_zero(scaled / precision / precision)
}

//================================================================================================//
//                                      SPOT PRICE & IMPACT                                      //
//================================================================================================//

/// Spot price of token0 in token1, scaled by 10^18. Zero when `reserve0`
/// is empty.
pub fn spot_price(reserve0: U256, reserve1: U256) -> U256 {
    if reserve0.is_zero() {
        return U256::zero();
    }
    let scaled = U512::from(reserve1) * U512::from(precision());
    to_u256_or_zero(scaled / U512::from(reserve0))
}

/// Propagates `amount_in` through every hop of a route. Zero as soon as any
/// hop produces nothing.
pub fn route_amount_out(hops: &[Hop], amount_in: U256) -> U256 {
    if hops.is_empty() || amount_in.is_zero() {
        return U256::zero();
    }
    let mut current = amount_in;
    for hop in hops {
        current = hop.snapshot.amount_out(current, hop.token_in);
        if current.is_zero() {
            return U256::zero();
        }
    }
    current
}

/// Zero-slippage reference output: simulate the route with the small probe
/// input, then scale linearly up to `amount_in`.
pub fn route_spot_amount(hops: &[Hop], amount_in: U256) -> U256 {
    let probe = spot_probe();
    let probe_out = route_amount_out(hops, probe);
    if probe_out.is_zero() {
        return U256::zero();
    }
    let scaled = U512::from(amount_in) * U512::from(probe_out);
    to_u256_or_zero(scaled / U512::from(probe))
}

/// Price impact in basis points from a spot reference and the realised
/// output. Clamped to [0, 10000].
pub fn price_impact_bps(spot: U256, actual: U256) -> u64 {
    if spot.is_zero() {
        return 0;
    }
    if actual.is_zero() {
        return BPS_DENOMINATOR;
    }
    if actual >= spot {
        return 0;
    }
    let diff = spot - actual;
    let impact = U512::from(diff) * U512::from(BPS_DENOMINATOR) / U512::from(spot);
    // diff < spot, so impact < 10000 and the cast cannot truncate.
    impact.as_u64()
}

/// Price impact of a whole route against its own spot simulation.
pub fn route_price_impact(hops: &[Hop], amount_in: U256) -> u64 {
    let spot = route_spot_amount(hops, amount_in);
    let actual = route_amount_out(hops, amount_in);
    price_impact_bps(spot, actual)
}

/// Percentage-weighted impact across split legs.
pub fn split_price_impact(legs: &[SplitLeg]) -> u64 {
    let mut total_weight = 0u64;
    let mut weighted = 0u64;
    for leg in legs {
        let impact = route_price_impact(&leg.route.hops, leg.amount_in);
        total_weight += leg.percentage;
        weighted += impact * leg.percentage;
    }
    if total_weight == 0 {
        return 0;
    }
    weighted / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DexProtocol, PoolSnapshot, Token};
    use ethers::types::Address;

    fn e18(units: u64) -> U256 {
        U256::from(units) * U256::exp10(18)
    }

    fn token(byte: u8) -> Token {
        Token {
            address: Address::repeat_byte(byte),
            symbol: format!("T{}", byte),
            name: String::new(),
            decimals: 18,
        }
    }

    fn hop(reserve0: U256, reserve1: U256, fee: u64) -> Hop {
        let snapshot = PoolSnapshot {
            address: Address::repeat_byte(0xaa),
            token0: token(1),
            token1: token(2),
            reserve0,
            reserve1,
            weight0: None,
            weight1: None,
            dex: DexProtocol::UniswapV2,
            fee,
            updated_at: 0,
        };
        Hop {
            token_in: snapshot.token0.address,
            token_out: snapshot.token1.address,
            snapshot,
        }
    }

    #[test]
    fn equal_pool_small_trade_loses_only_the_fee() {
        // 10000/10000 pool, 1 token in at 0.3%: output lands in [0.99, 1.0).
        let out = constant_product_out(e18(10_000), e18(10_000), e18(1), 30);
        assert!(out >= e18(1) * U256::from(99u64) / U256::from(100u64));
        assert!(out < e18(1));
    }

    #[test]
    fn zero_preconditions_quote_zero() {
        assert!(constant_product_out(U256::zero(), e18(1), e18(1), 30).is_zero());
        assert!(constant_product_out(e18(1), U256::zero(), e18(1), 30).is_zero());
        assert!(constant_product_out(e18(1), e18(1), U256::zero(), 30).is_zero());
        assert!(constant_product_out(e18(1), e18(1), e18(1), 10_000).is_zero());
    }

    #[test]
    fn fee_is_monotonic() {
        let mut previous = U256::MAX;
        for fee in [0u64, 1, 5, 30, 100, 300, 1_000, 9_999] {
            let out = constant_product_out(e18(10_000), e18(10_000), e18(1), fee);
            assert!(out <= previous, "fee {} raised the output", fee);
            previous = out;
        }
    }

    #[test]
    fn depth_scaling_is_homogeneous() {
        // Scaling reserves and input by the same factor scales the output by
        // that factor, up to floor rounding.
        let base = constant_product_out(e18(10_000), e18(10_000), e18(1), 30);
        for factor in [2u64, 10, 1_000] {
            let f = U256::from(factor);
            let scaled = constant_product_out(e18(10_000) * f, e18(10_000) * f, e18(1) * f, 30);
            assert!(scaled >= base * f);
            assert!(scaled - base * f <= f);
        }
    }

    #[test]
    fn deeper_pools_never_quote_worse() {
        let base = constant_product_out(e18(10_000), e18(10_000), e18(1), 30);
        for factor in [2u64, 10, 1_000] {
            let f = U256::from(factor);
            let deep = constant_product_out(e18(10_000) * f, e18(10_000) * f, e18(1), 30);
            assert!(deep >= base);
        }
    }

    #[test]
    fn output_stays_below_the_spot_line() {
        let reserve_in = e18(5_000);
        let reserve_out = e18(20_000);
        let amount_in = e18(7);
        let out = constant_product_out(reserve_in, reserve_out, amount_in, 30);
        let spot_line = amount_in * reserve_out / reserve_in;
        assert!(out < spot_line);
    }

    #[test]
    fn huge_reserves_do_not_overflow() {
        let near_max = U256::MAX / U256::from(2u64);
        let out = constant_product_out(near_max, near_max, U256::exp10(30), 30);
        assert!(!out.is_zero());
        assert!(out < near_max);
    }

    #[test]
    fn weighted_equal_weights_match_constant_product_shape() {
        let out = weighted_amount_out(e18(10_000), e18(10_000), e18(1), 5_000, 5_000, 30);
        // Same curve as constant-product modulo the fee flooring order.
        let reference = constant_product_out(e18(10_000), e18(10_000), e18(1), 30);
        let gap = if out > reference {
            out - reference
        } else {
            reference - out
        };
        assert!(gap <= U256::from(10_000u64));
    }

    #[test]
    fn weighted_unequal_weights_tilt_the_quote() {
        let heavy_in = weighted_amount_out(e18(10_000), e18(10_000), e18(1), 6_000, 4_000, 30);
        let heavy_out = weighted_amount_out(e18(10_000), e18(10_000), e18(1), 4_000, 6_000, 30);
        assert!(heavy_in > heavy_out);
    }

    #[test]
    fn spot_price_scales_to_1e18() {
        assert_eq!(spot_price(e18(100), e18(100)), precision());
        assert_eq!(spot_price(e18(100), e18(200)), precision() * U256::from(2u64));
        assert!(spot_price(U256::zero(), e18(1)).is_zero());
    }

    #[test]
    fn impact_is_clamped() {
        assert_eq!(price_impact_bps(U256::zero(), U256::zero()), 0);
        assert_eq!(price_impact_bps(e18(1), U256::zero()), 10_000);
        assert_eq!(price_impact_bps(e18(1), e18(2)), 0);
        let deep = price_impact_bps(e18(100), e18(1));
        assert!(deep > 0 && deep <= 10_000);
    }

    #[test]
    fn shallow_pool_shows_more_impact_than_deep_pool() {
        let shallow = vec![hop(e18(1_000), e18(1_000), 30)];
        let deep = vec![hop(e18(1_000_000), e18(1_000_000), 30)];
        let amount = e18(100);
        assert!(route_price_impact(&shallow, amount) > route_price_impact(&deep, amount));
    }

    #[test]
    fn spot_amount_scales_linearly_with_input() {
        let hops = vec![hop(e18(10_000), e18(10_000), 30)];
        let one = route_spot_amount(&hops, e18(1));
        let ten = route_spot_amount(&hops, e18(10));
        assert_eq!(ten, one * U256::from(10u64));
    }

    #[test]
    fn dead_hop_kills_the_route() {
        let hops = vec![hop(e18(10), e18(10), 30), hop(U256::zero(), U256::zero(), 30)];
        assert!(route_amount_out(&hops, e18(1)).is_zero());
        assert!(route_spot_amount(&hops, e18(1)).is_zero());
    }
}
