//! Behaviour of the per-chain RPC clients: feed and supply decoding, RPC
//! error classification and breaker isolation between chains.

mod support;

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde_json::json;
use tokenfeed_core::{ChainId, CircuitState, RetryPolicy, SourceId, UpstreamError, UtcDateTime};
use tokio::time::Instant;

use support::{breaker, rpc_result, service, service_with, settings, Reply, ScriptedHttp};

const ROUND_DATA: &str = "0xfeaf968c";
const DECIMALS: &str = "0x313ce567";
const TOTAL_SUPPLY: &str = "0x18160ddd";
const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).expect("decimal literal")
}

fn script_feed(http: &ScriptedHttp, host: &str, answer: i128, decimals: i128) {
    http.on(
        &[host, ROUND_DATA],
        Reply::json(rpc_result(&[
            92_233_720_368_547_790_000,
            answer,
            1_700_000_000,
            1_700_000_060,
            92_233_720_368_547_790_000,
        ])),
    );
    http.on(&[host, DECIMALS], Reply::json(rpc_result(&[decimals])));
}

#[tokio::test(start_paused = true)]
async fn feed_reading_scales_answer_by_decimals() {
    // Given: ETH/USD answers 2500.12345678 with 8 decimals
    let http = ScriptedHttp::new();
    script_feed(&http, "ethereum.rpc.test", 250_012_345_678, 8);
    let service = service(&http);

    // When: the pair is asked for in lowercase
    let reading = service.feed_reading("eth/usd", "ethereum").await.expect("reading");

    // Then
    assert_eq!(reading.pair, "ETH/USD");
    assert_eq!(reading.price, dec("2500.12345678"));
    assert_eq!(reading.decimals, 8);
    assert_eq!(reading.chain, ChainId::Ethereum);
    assert_eq!(reading.feed_address, "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419");
    assert_eq!(reading.round_id, Some(92_233_720_368_547_790_000));
    assert_eq!(
        reading.observed_at,
        UtcDateTime::from_unix_seconds(1_700_000_060).expect("in range")
    );
    assert_eq!(
        reading.started_at,
        Some(UtcDateTime::from_unix_seconds(1_700_000_000).expect("in range"))
    );
    assert_eq!(reading.source, SourceId::Chainlink);

    // And: the calls went to the feed contract
    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|request| request.body.as_deref().unwrap_or_default().contains("0x5f4eC3Df")));
}

#[tokio::test(start_paused = true)]
async fn feed_reading_is_cached_per_pair() {
    let http = ScriptedHttp::new();
    script_feed(&http, "ethereum.rpc.test", 250_000_000_000, 8);
    let service = service(&http);

    let first = service.feed_reading("ETH/USD", "ethereum").await.expect("first");
    let second = service.feed_reading(" eth/usd ", "Ethereum").await.expect("cached");

    assert_eq!(first, second);
    assert_eq!(http.total(), 2);
}

#[tokio::test(start_paused = true)]
async fn pair_without_feed_is_rejected_without_rpc_call() {
    let http = ScriptedHttp::new();
    let service = service(&http);

    let error = service.feed_reading("MATIC/USD", "ethereum").await.expect_err("no feed");

    assert!(matches!(
        error,
        UpstreamError::UnsupportedPair { ref chain, ref pair } if chain == "ethereum" && pair == "MATIC/USD"
    ));
    assert_eq!(http.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_chain_is_unsupported() {
    let http = ScriptedHttp::new();
    let service = service(&http);

    let feed = service.feed_reading("ETH/USD", "solana").await.expect_err("unknown chain");
    let supply = service.supply(USDC, "solana").await.expect_err("unknown chain");

    assert!(matches!(feed, UpstreamError::UnsupportedChain { .. }));
    assert!(matches!(supply, UpstreamError::UnsupportedChain { .. }));
    assert_eq!(http.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn supply_is_normalized_by_token_decimals() {
    // Given: 25 billion USDC with 6 decimals
    let http = ScriptedHttp::new();
    http.on(
        &["ethereum.rpc.test", TOTAL_SUPPLY],
        Reply::json(rpc_result(&[25_000_000_000_000_000])),
    );
    http.on(&["ethereum.rpc.test", DECIMALS], Reply::json(rpc_result(&[6])));
    let service = service(&http);

    let reading = service.supply(USDC, "ethereum").await.expect("supply");

    assert_eq!(reading.total_supply, dec("25000000000"));
    assert_eq!(reading.decimals, 6);
    assert_eq!(reading.token_address.as_str(), USDC);
    assert_eq!(reading.circulating_supply, None);
    assert_eq!(reading.max_supply, None);
    assert_eq!(reading.source, SourceId::Erc20);

    // Address case does not split the cache
    service
        .supply(&USDC.to_ascii_lowercase(), "ethereum")
        .await
        .expect("cached");
    assert_eq!(http.count(&[TOTAL_SUPPLY]), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_address_is_invalid_request() {
    let http = ScriptedHttp::new();
    let service = service(&http);

    for address in ["0x1234", "A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "0xZZb86991c6218b36c1d19D4a2e9Eb0cE3606eB48"] {
        let error = service.supply(address, "ethereum").await.expect_err("bad address");
        assert!(matches!(error, UpstreamError::InvalidRequest(_)), "{address}: {error:?}");
    }
    assert_eq!(http.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn rpc_limit_error_is_retried_after_cooldown() {
    let http = ScriptedHttp::new();
    http.on(
        &["ethereum.rpc.test", DECIMALS],
        Reply::json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32005, "message": "daily request count exceeded"}
        })),
    );
    http.on(&["ethereum.rpc.test", DECIMALS], Reply::json(rpc_result(&[6])));
    http.on(
        &["ethereum.rpc.test", TOTAL_SUPPLY],
        Reply::json(rpc_result(&[1_000_000])),
    );
    let service = service(&http);
    let started = Instant::now();

    let reading = service.supply(USDC, "ethereum").await.expect("second attempt succeeds");

    assert_eq!(reading.total_supply, dec("1"));
    assert_eq!(http.count(&[DECIMALS]), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn reverted_call_is_not_retried_and_keeps_breaker_closed() {
    let http = ScriptedHttp::new();
    http.on(
        &["ethereum.rpc.test", TOTAL_SUPPLY],
        Reply::json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3, "message": "execution reverted"}
        })),
    );
    let service = service(&http);

    let error = service.supply(USDC, "ethereum").await.expect_err("reverted");

    assert!(matches!(error, UpstreamError::InvalidRequest(_)));
    assert_eq!(http.total(), 1);
    let ethereum = service.chain_upstream("ethereum").expect("supported");
    assert_eq!(ethereum.health().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn failing_chain_does_not_affect_other_chains_or_price_api() {
    // Given: ethereum's RPC is down, polygon's works; breaker trips on one failure
    let http = ScriptedHttp::new();
    http.on(&["ethereum.rpc.test"], Reply::connection_refused());
    script_feed(&http, "polygon.rpc.test", 250_000_000_000, 8);
    let mut settings = settings();
    settings.retry = RetryPolicy::no_retry();
    settings.breaker = breaker(1);
    let service = service_with(&http, settings);

    // When
    let ethereum = service.feed_reading("ETH/USD", "ethereum").await;
    let polygon = service.feed_reading("ETH/USD", "polygon").await;

    // Then: only ethereum's breaker is open
    assert!(matches!(ethereum, Err(UpstreamError::RetriesExhausted { .. })));
    assert_eq!(polygon.expect("polygon unaffected").price, dec("2500"));

    let report = service.health_report();
    let state_of = |name: &str| {
        report
            .iter()
            .find(|entry| entry.upstream == name)
            .map(|entry| entry.state)
    };
    assert_eq!(state_of("ethereum-rpc"), Some(CircuitState::Open));
    assert_eq!(state_of("polygon-rpc"), Some(CircuitState::Closed));
    assert_eq!(state_of("coingecko"), Some(CircuitState::Closed));

    // And: ethereum now fails fast
    let again = service.feed_reading("BTC/USD", "ethereum").await;
    assert!(matches!(again, Err(UpstreamError::CircuitOpen { ref upstream }) if upstream == "ethereum-rpc"));
    assert_eq!(http.count(&["ethereum.rpc.test"]), 1);
}
