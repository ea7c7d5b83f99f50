//! Venue adapter tests over a canned-response chain client: call data is
//! really encoded, return data really decoded, so the ABI layer is exercised
//! exactly as it would be against live contracts.

mod common;

use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tokio_util::sync::CancellationToken;

use common::{e18, token, word_address, word_u256, MockChainClient};
use dex_aggregator::abi::selectors;
use dex_aggregator::config::{BalancerPoolConfig, CurvePoolConfig};
use dex_aggregator::dex::{
    BalancerClient, CurveClient, DexClient, UniswapV2Client, UniswapV3Client,
};
use dex_aggregator::dex_math;
use dex_aggregator::errors::DexError;
use dex_aggregator::types::DexProtocol;

fn factory() -> Address {
    Address::repeat_byte(0xf1)
}

fn fresh() -> CancellationToken {
    CancellationToken::new()
}

fn pair() -> Address {
    Address::repeat_byte(0xa1)
}

#[tokio::test]
async fn v2_adapter_reads_pair_and_prices_locally() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let reserve0 = e18(10_000);
    let reserve1 = e18(20_000);

    let mut reserves_ret = Vec::new();
    reserves_ret.extend_from_slice(&word_u256(reserve0));
    reserves_ret.extend_from_slice(&word_u256(reserve1));
    reserves_ret.extend_from_slice(&word_u256(U256::from(1_700_000_000u64)));

    let chain = MockChainClient::new()
        .respond(factory(), selectors::V2_GET_PAIR, word_address(pair()).to_vec())
        .respond(pair(), selectors::V2_GET_RESERVES, reserves_ret);

    let client = UniswapV2Client::new(Arc::new(chain), factory());
    let quote = client.quote(&a, &b, e18(1), &fresh()).await.expect("quote");

    assert_eq!(quote.snapshot.address, pair());
    assert_eq!(quote.snapshot.dex, DexProtocol::UniswapV2);
    assert_eq!(quote.snapshot.fee, 30);
    assert_eq!(quote.snapshot.token0.address, a.address);
    assert_eq!(quote.snapshot.reserve0, reserve0);
    assert_eq!(
        quote.amount_out,
        dex_math::constant_product_out(reserve0, reserve1, e18(1), 30)
    );
}

#[tokio::test]
async fn v2_adapter_maps_zero_pair_to_not_found() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let chain = MockChainClient::new().respond(
        factory(),
        selectors::V2_GET_PAIR,
        word_address(Address::zero()).to_vec(),
    );

    let client = UniswapV2Client::new(Arc::new(chain), factory());
    let err = client
        .quote(&a, &b, e18(1), &fresh())
        .await
        .expect_err("no pair");
    assert!(matches!(err, DexError::PairNotFound));
}

#[tokio::test]
async fn sushiswap_shares_the_v2_wire_format() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);

    let mut reserves_ret = Vec::new();
    reserves_ret.extend_from_slice(&word_u256(e18(5_000)));
    reserves_ret.extend_from_slice(&word_u256(e18(5_000)));
    reserves_ret.extend_from_slice(&word_u256(U256::zero()));

    let chain = MockChainClient::new()
        .respond(factory(), selectors::V2_GET_PAIR, word_address(pair()).to_vec())
        .respond(pair(), selectors::V2_GET_RESERVES, reserves_ret);

    let client = UniswapV2Client::sushiswap(Arc::new(chain), factory());
    let quote = client.quote(&a, &b, e18(1), &fresh()).await.expect("quote");
    assert_eq!(quote.snapshot.dex, DexProtocol::Sushiswap);
}

#[tokio::test]
async fn v3_adapter_picks_the_best_fee_tier() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let quoter = Address::repeat_byte(0x71);
    let pool_500 = Address::repeat_byte(0x05);
    let pool_3000 = Address::repeat_byte(0x30);

    // Both tiers exist; the 3000 tier quotes higher. Quoter returns the
    // QuoterV2 four-word tuple, of which only the first word matters.
    let quote_words = |amount: u64| {
        let mut ret = Vec::new();
        ret.extend_from_slice(&word_u256(U256::from(amount)));
        ret.extend_from_slice(&word_u256(U256::from(1u64) << 96));
        ret.extend_from_slice(&word_u256(U256::from(3u64)));
        ret.extend_from_slice(&word_u256(U256::from(80_000u64)));
        ret
    };

    let chain = MockChainClient::new()
        .respond(factory(), selectors::V3_GET_POOL, word_address(pool_500).to_vec())
        .respond(factory(), selectors::V3_GET_POOL, word_address(pool_3000).to_vec())
        .respond(quoter, selectors::V3_QUOTE_EXACT_INPUT_SINGLE, quote_words(100))
        .respond(quoter, selectors::V3_QUOTE_EXACT_INPUT_SINGLE, quote_words(150));

    let client = UniswapV3Client::new(Arc::new(chain), factory(), quoter, vec![500, 3_000]);
    let quote = client.quote(&a, &b, e18(1), &fresh()).await.expect("quote");

    assert_eq!(quote.amount_out, U256::from(150u64));
    assert_eq!(quote.snapshot.fee, 3_000);
    assert_eq!(quote.snapshot.address, pool_3000);
    assert!(!quote.snapshot.has_reserves(), "V3 snapshots carry no reserves");
}

#[tokio::test]
async fn v3_adapter_skips_missing_tiers() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let quoter = Address::repeat_byte(0x77);
    let pool_3000 = Address::repeat_byte(0x30);

    let mut quoter_ret = word_u256(U256::from(42u64)).to_vec();
    quoter_ret.extend_from_slice(&word_u256(U256::zero()));

    let chain = MockChainClient::new()
        // Tier 500 has no pool; tier 3000 does.
        .respond(factory(), selectors::V3_GET_POOL, word_address(Address::zero()).to_vec())
        .respond(factory(), selectors::V3_GET_POOL, word_address(pool_3000).to_vec())
        .respond(quoter, selectors::V3_QUOTE_EXACT_INPUT_SINGLE, quoter_ret);

    let client = UniswapV3Client::new(Arc::new(chain), factory(), quoter, vec![500, 3_000]);
    let quote = client.quote(&a, &b, e18(1), &fresh()).await.expect("quote");
    assert_eq!(quote.amount_out, U256::from(42u64));
    assert_eq!(quote.snapshot.fee, 3_000);
}

#[tokio::test]
async fn v3_adapter_with_no_pools_yields_no_quote() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let chain = MockChainClient::new().respond(
        factory(),
        selectors::V3_GET_POOL,
        word_address(Address::zero()).to_vec(),
    );

    let client = UniswapV3Client::new(
        Arc::new(chain),
        factory(),
        Address::repeat_byte(0x77),
        vec![500],
    );
    let err = client
        .quote(&a, &b, e18(1), &fresh())
        .await
        .expect_err("no pools");
    assert!(matches!(err, DexError::NoQuote));
}

#[tokio::test]
async fn curve_adapter_quotes_via_get_dy() {
    let dai = token(0x0d, "DAI", 18);
    let usdt = token(0x7e, "USDT", 6);
    let usdc = token(0x5c, "USDC", 6);
    let pool_addr = Address::repeat_byte(0x3b);

    let config = CurvePoolConfig {
        address: pool_addr,
        coins: vec![dai.address, usdc.address, usdt.address],
        name: "3pool".to_string(),
    };

    let amount_out = U256::from(999_400u64);
    let chain = MockChainClient::new()
        .respond(pool_addr, selectors::CURVE_GET_DY, word_u256(amount_out).to_vec())
        // balances(i) then balances(j), consumed in call order.
        .respond(pool_addr, selectors::CURVE_BALANCES, word_u256(e18(1_000_000)).to_vec())
        .respond(
            pool_addr,
            selectors::CURVE_BALANCES,
            word_u256(U256::from(1_000_000u64) * U256::exp10(6)).to_vec(),
        )
        // fee() in 1e10 units: 4_000_000 = 0.04% = 4 bps.
        .respond(pool_addr, selectors::CURVE_FEE, word_u256(U256::from(4_000_000u64)).to_vec());

    let client = CurveClient::new(Arc::new(chain), vec![config]);
    let quote = client
        .quote(&dai, &usdt, U256::exp10(18), &fresh())
        .await
        .expect("quote");

    assert_eq!(quote.amount_out, amount_out);
    assert_eq!(quote.snapshot.dex, DexProtocol::Curve);
    assert_eq!(quote.snapshot.fee, 4);
    // Tokens normalised: 0x0d… < 0x7e….
    assert_eq!(quote.snapshot.token0.address, dai.address);
    assert_eq!(quote.snapshot.reserve0, e18(1_000_000));
}

#[tokio::test]
async fn curve_fee_failure_falls_back_to_default() {
    let dai = token(0x0d, "DAI", 18);
    let usdc = token(0x5c, "USDC", 6);
    let pool_addr = Address::repeat_byte(0x3b);

    let config = CurvePoolConfig {
        address: pool_addr,
        coins: vec![dai.address, usdc.address],
        name: "2pool".to_string(),
    };

    // No fee() response registered: the call reverts, the default applies.
    let chain = MockChainClient::new()
        .respond(pool_addr, selectors::CURVE_GET_DY, word_u256(U256::from(7u64)).to_vec())
        .respond(pool_addr, selectors::CURVE_BALANCES, word_u256(e18(1)).to_vec())
        .respond(pool_addr, selectors::CURVE_BALANCES, word_u256(e18(1)).to_vec());

    let client = CurveClient::new(Arc::new(chain), vec![config]);
    let quote = client
        .quote(&dai, &usdc, U256::exp10(18), &fresh())
        .await
        .expect("quote");
    assert_eq!(quote.snapshot.fee, 4);
}

#[tokio::test]
async fn curve_unknown_pair_is_pool_not_found() {
    let dai = token(0x0d, "DAI", 18);
    let stranger = token(0x99, "ZZZ", 18);
    let client = CurveClient::new(Arc::new(MockChainClient::new()), vec![]);
    let err = client
        .quote(&dai, &stranger, U256::exp10(18), &fresh())
        .await
        .expect_err("not in any pool");
    assert!(matches!(err, DexError::PoolNotFound));
}

#[tokio::test]
async fn balancer_adapter_reads_vault_balances_and_weights() {
    let dai = token(0x0d, "DAI", 18);
    let weth = token(0xee, "WETH", 18);
    let vault = Address::repeat_byte(0xba);
    let pool_addr = Address::repeat_byte(0xb1);

    let config = BalancerPoolConfig {
        pool_id: H256::repeat_byte(0x42),
        address: pool_addr,
        tokens: vec![weth.address, dai.address],
        weights: vec![6_000, 4_000],
        swap_fee_bps: 30,
        name: "WETH/DAI 60/40".to_string(),
    };

    let weth_balance = e18(10_000);
    let dai_balance = e18(4_000_000);

    // getPoolTokens -> (address[] tokens, uint256[] balances, uint256
    // lastChangeBlock). Head words, then both tails.
    let mut ret = Vec::new();
    ret.extend_from_slice(&word_u256(U256::from(0x60u64))); // tokens offset
    ret.extend_from_slice(&word_u256(U256::from(0xc0u64))); // balances offset
    ret.extend_from_slice(&word_u256(U256::from(17_000_000u64))); // lastChangeBlock
    ret.extend_from_slice(&word_u256(U256::from(2u64))); // tokens.len
    ret.extend_from_slice(&word_address(weth.address));
    ret.extend_from_slice(&word_address(dai.address));
    ret.extend_from_slice(&word_u256(U256::from(2u64))); // balances.len
    ret.extend_from_slice(&word_u256(weth_balance));
    ret.extend_from_slice(&word_u256(dai_balance));

    let chain = MockChainClient::new().respond(vault, selectors::BALANCER_GET_POOL_TOKENS, ret);

    let client = BalancerClient::new(Arc::new(chain), vault, vec![config]);
    let quote = client
        .quote(&weth, &dai, e18(1), &fresh())
        .await
        .expect("quote");

    assert_eq!(
        quote.amount_out,
        dex_math::weighted_amount_out(weth_balance, dai_balance, e18(1), 6_000, 4_000, 30)
    );
    // Sorted snapshot: DAI (0x0d…) is token0 and carries its 40% weight.
    assert_eq!(quote.snapshot.token0.address, dai.address);
    assert_eq!(quote.snapshot.weight0, Some(4_000));
    assert_eq!(quote.snapshot.weight1, Some(6_000));
    assert_eq!(quote.snapshot.reserve0, dai_balance);
    assert_eq!(quote.snapshot.reserve1, weth_balance);
}

#[tokio::test]
async fn balancer_unknown_pair_is_pool_not_found() {
    let a = token(0x11, "AAA", 18);
    let b = token(0x22, "BBB", 18);
    let client = BalancerClient::new(
        Arc::new(MockChainClient::new()),
        Address::repeat_byte(0xba),
        vec![],
    );
    let err = client
        .quote(&a, &b, e18(1), &fresh())
        .await
        .expect_err("no pool");
    assert!(matches!(err, DexError::PoolNotFound));
}
