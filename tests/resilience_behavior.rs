//! Behaviour of the resilience layer as seen through a real upstream client:
//! breaker transitions, the retry schedule on the wire, timeouts and
//! cancellation.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokenfeed_core::{
    CircuitState, ExpiringCache, HttpClient, PriceUpstream, PriceUpstreamConfig, RetryPolicy,
    ThrottleSettings, TransientKind, UpstreamError,
};
use tokio::time::Instant;

use support::{
    breaker, price_upstream, price_upstream_with, retry_policy, Reply, ScriptedHttp, PRICE_BASE,
};

fn global_payload() -> serde_json::Value {
    json!({
        "data": {
            "total_market_cap": { "usd": 2_400_000_000_000_u64 },
            "total_volume": { "usd": 95_000_000_000_u64 },
            "market_cap_change_percentage_24h_usd": 1.25,
            "market_cap_percentage": { "btc": 52.1, "eth": 17.3 },
            "active_cryptocurrencies": 10_500,
            "markets": 1_050
        }
    })
}

// =============================================================================
// Circuit breaker
// =============================================================================

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_threshold_and_stops_calling_upstream() {
    // Given: an upstream that refuses every connection and a threshold of 2
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::connection_refused());
    let upstream = price_upstream_with(&http, RetryPolicy::no_retry(), breaker(2));

    // When: two calls fail
    for _ in 0..2 {
        let error = upstream.fetch_market_snapshot().await.expect_err("refused");
        assert!(error.counts_against_upstream());
    }

    // Then: the breaker is open and the third call fails fast without a request
    assert_eq!(upstream.health().state, CircuitState::Open);
    let error = upstream.fetch_market_snapshot().await.expect_err("open");
    assert!(matches!(error, UpstreamError::CircuitOpen { ref upstream } if upstream == "coingecko"));
    assert_eq!(http.count(&["/global"]), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_probe_after_recovery_timeout_closes_breaker() {
    // Given: an open breaker
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::status(503));
    let upstream = price_upstream_with(&http, RetryPolicy::no_retry(), breaker(1));
    upstream.fetch_market_snapshot().await.expect_err("503");
    assert_eq!(upstream.health().state, CircuitState::Open);

    // When: the upstream recovers but the timeout has not elapsed yet
    http.replace(&["/global"], Reply::json(global_payload()));
    tokio::time::advance(Duration::from_secs(59)).await;
    let early = upstream.fetch_market_snapshot().await;

    // Then: still failing fast
    assert!(matches!(early, Err(UpstreamError::CircuitOpen { .. })));
    assert_eq!(http.count(&["/global"]), 1);

    // When: the recovery timeout elapses
    tokio::time::advance(Duration::from_secs(1)).await;
    let snapshot = upstream.fetch_market_snapshot().await.expect("probe succeeds");

    // Then: the probe went through and the breaker is closed with a reset count
    assert_eq!(snapshot.active_count, 10_500);
    let health = upstream.health();
    assert_eq!(health.state, CircuitState::Closed);
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_with_fresh_timeout() {
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::status(503));
    let upstream = price_upstream_with(&http, RetryPolicy::no_retry(), breaker(1));
    upstream.fetch_market_snapshot().await.expect_err("503");

    // Probe after 60s fails again
    tokio::time::advance(Duration::from_secs(60)).await;
    let probe = upstream.fetch_market_snapshot().await.expect_err("probe fails");
    assert!(probe.counts_against_upstream());
    assert_eq!(upstream.health().state, CircuitState::Open);

    // The next window starts at the failed probe, not at the first opening
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(matches!(
        upstream.fetch_market_snapshot().await,
        Err(UpstreamError::CircuitOpen { .. })
    ));
    assert_eq!(http.count(&["/global"]), 2);
}

#[tokio::test(start_paused = true)]
async fn not_found_neither_retries_nor_trips_breaker() {
    let http = ScriptedHttp::new();
    http.on(&["/coins/ghost-coin?"], Reply::status(404));
    let upstream = price_upstream_with(&http, retry_policy(), breaker(1));

    let error = upstream.fetch_detail("ghost-coin").await.expect_err("404");

    assert!(matches!(error, UpstreamError::NotFound { .. }));
    assert_eq!(http.total(), 1);
    assert_eq!(upstream.health().state, CircuitState::Closed);
}

// =============================================================================
// Retry schedule
// =============================================================================

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_exponential_backoff() {
    // Given: 3 attempts, 1s base delay, multiplier 2; the first two attempts fail
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::status(502));
    http.on(&["/global"], Reply::connection_refused());
    http.on(&["/global"], Reply::json(global_payload()));
    let upstream = price_upstream(&http);
    let started = Instant::now();

    // When
    let snapshot = upstream.fetch_market_snapshot().await.expect("third attempt succeeds");

    // Then: waited 1s then 2s, and returned the third attempt's result
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(http.count(&["/global"]), 3);
    assert_eq!(snapshot.market_count, 1_050);
    assert_eq!(upstream.health().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_wrap_last_error_and_count_once() {
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::connection_refused());
    http.on(&["/global"], Reply::status(500));
    http.on(&["/global"], Reply::status(503));
    let upstream = price_upstream(&http);

    let error = upstream.fetch_market_snapshot().await.expect_err("all attempts fail");

    match error {
        UpstreamError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.kind, TransientKind::ServerError { status: 503 });
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(upstream.health().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_adds_cooldown_before_retry() {
    let http = ScriptedHttp::new();
    http.on(&["/global"], Reply::status(429));
    http.on(&["/global"], Reply::json(global_payload()));
    let upstream = price_upstream(&http);
    let started = Instant::now();

    upstream.fetch_market_snapshot().await.expect("second attempt succeeds");

    // 1s backoff plus the 60s rate-limit cooldown
    assert_eq!(started.elapsed(), Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn slow_attempt_times_out_and_is_retried() {
    let http = ScriptedHttp::new();
    http.on(
        &["/global"],
        Reply::json(global_payload()).after(Duration::from_secs(45)),
    );
    http.on(&["/global"], Reply::json(global_payload()));
    let upstream = price_upstream(&http);
    let started = Instant::now();

    upstream.fetch_market_snapshot().await.expect("retry succeeds");

    // 30s attempt timeout, then the 1s backoff
    assert_eq!(started.elapsed(), Duration::from_secs(31));
    assert_eq!(http.count(&["/global"]), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_call_is_not_counted_as_failure() {
    let http = ScriptedHttp::new();
    http.on(
        &["/global"],
        Reply::json(global_payload()).after(Duration::from_secs(20)),
    );
    let upstream = price_upstream_with(&http, retry_policy(), breaker(1));

    let abandoned =
        tokio::time::timeout(Duration::from_secs(5), upstream.fetch_market_snapshot()).await;

    assert!(abandoned.is_err());
    let health = upstream.health();
    assert_eq!(health.state, CircuitState::Closed);
    assert_eq!(health.consecutive_failures, 0);
}

// =============================================================================
// Request budget
// =============================================================================

// The rate limiter runs on the wall clock, so this test keeps real time.
#[tokio::test]
async fn request_past_the_burst_waits_for_budget() {
    // Given: a budget of 120 requests a minute (one every 500ms) with a burst of 2
    let http = ScriptedHttp::new();
    http.on(&["/search?query="], Reply::json(json!({ "coins": [] })));
    let upstream = PriceUpstream::new(
        Arc::clone(&http) as Arc<dyn HttpClient>,
        PriceUpstreamConfig {
            base_url: PRICE_BASE.to_owned(),
            retry: retry_policy(),
            breaker: breaker(5),
            throttle: Some(ThrottleSettings {
                per_minute: 120,
                burst: 2,
            }),
            ..PriceUpstreamConfig::default()
        },
    );
    let started = std::time::Instant::now();

    // When: the burst is spent on two uncached searches
    upstream.search("bitcoin").await.expect("first");
    upstream.search("ether").await.expect("second");
    let within_burst = started.elapsed();

    // Then: the third search is held back until budget frees up
    upstream.search("solana").await.expect("third");
    let total = started.elapsed();

    assert!(within_burst < Duration::from_millis(250), "burst took {within_burst:?}");
    assert!(total >= Duration::from_millis(400), "third search went out after {total:?}");
    assert_eq!(http.count(&["/search?query="]), 3);
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cached_value_is_returned_until_ttl_elapses() {
    let cache: ExpiringCache<String, u32> = ExpiringCache::new(16);

    cache.put("k".to_owned(), 7, Duration::from_secs(300)).await;
    assert_eq!(cache.get("k").await, Some(7));

    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(cache.get("k").await, None);
}
