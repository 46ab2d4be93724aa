//! Scripted upstreams shared by the behaviour tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokenfeed_core::{
    AggregatorService, Backoff, CircuitBreakerConfig, HttpClient, HttpError, HttpRequest,
    HttpResponse, PriceUpstream, PriceUpstreamConfig, RetryPolicy, Settings,
};

pub const PRICE_BASE: &str = "https://prices.test/api/v3";

/// One scripted answer, optionally delivered after a (paused-clock) delay.
#[derive(Debug, Clone)]
pub struct Reply {
    delay: Option<Duration>,
    outcome: Result<HttpResponse, HttpError>,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            delay: None,
            outcome: Ok(HttpResponse::ok_json(body.to_string())),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            delay: None,
            outcome: Ok(HttpResponse::new(status, "{}")),
        }
    }

    pub fn connection_refused() -> Self {
        Self {
            delay: None,
            outcome: Err(HttpError::connect("connection refused")),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Route {
    parts: Vec<String>,
    replies: VecDeque<Reply>,
}

impl Route {
    fn matches(&self, haystack: &str) -> bool {
        self.parts.iter().all(|part| haystack.contains(part.as_str()))
    }

    fn specificity(&self) -> (usize, usize) {
        (self.parts.len(), self.parts.iter().map(String::len).sum())
    }

    /// The last scripted reply repeats forever.
    fn next(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(|| Reply::status(404))
        } else {
            self.replies.front().cloned().unwrap_or_else(|| Reply::status(404))
        }
    }
}

/// Fake upstream answering by URL/body substrings and recording every request.
///
/// When several routes match, the most specific one (most parts, then
/// longest) answers. Unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `reply` for requests whose URL or body contains every one of `parts`.
    pub fn on(&self, parts: &[&str], reply: Reply) -> &Self {
        let mut routes = self.routes.lock().expect("routes lock");
        let parts: Vec<String> = parts.iter().map(|part| (*part).to_owned()).collect();
        match routes.iter_mut().find(|route| route.parts == parts) {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                parts,
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    /// Drop whatever is scripted for `parts` and answer with `reply` from now on.
    pub fn replace(&self, parts: &[&str], reply: Reply) -> &Self {
        self.routes
            .lock()
            .expect("routes lock")
            .retain(|route| route.parts.iter().map(String::as_str).ne(parts.iter().copied()));
        self.on(parts, reply)
    }

    /// Requests seen so far whose URL or body contains every one of `parts`.
    pub fn count(&self, parts: &[&str]) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|request| {
                let haystack = haystack(request);
                parts.iter().all(|part| haystack.contains(part))
            })
            .count()
    }

    pub fn total(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn reply_for(&self, haystack: &str) -> Reply {
        let mut routes = self.routes.lock().expect("routes lock");
        routes
            .iter_mut()
            .filter(|route| route.matches(haystack))
            .max_by_key(|route| route.specificity())
            .map(Route::next)
            .unwrap_or_else(|| Reply::status(404))
    }
}

fn haystack(request: &HttpRequest) -> String {
    format!("{} {}", request.url, request.body.as_deref().unwrap_or_default())
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let reply = self.reply_for(&haystack(&request));
        self.requests.lock().expect("requests lock").push(request);

        Box::pin(async move {
            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            reply.outcome
        })
    }
}

/// Retry schedule used across the behaviour tests: 3 attempts, 1s then 2s.
pub fn retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Backoff::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        },
        rate_limit_cooldown: Duration::from_secs(60),
        attempt_timeout: Duration::from_secs(30),
    }
}

pub fn breaker(failure_threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        recovery_timeout: Duration::from_secs(60),
    }
}

pub fn rpc_url(chain: &str) -> String {
    format!("https://{chain}.rpc.test")
}

pub fn settings() -> Settings {
    let mut settings = Settings {
        coingecko_base_url: PRICE_BASE.to_owned(),
        retry: retry_policy(),
        breaker: breaker(5),
        ..Settings::default()
    };
    for (chain, url) in settings.rpc_urls.iter_mut() {
        *url = rpc_url(chain.as_str());
    }
    settings
}

pub fn service(http: &Arc<ScriptedHttp>) -> AggregatorService {
    service_with(http, settings())
}

pub fn service_with(http: &Arc<ScriptedHttp>, settings: Settings) -> AggregatorService {
    AggregatorService::builder()
        .settings(settings)
        .http_client(Arc::clone(http) as Arc<dyn HttpClient>)
        .without_throttle()
        .build()
        .expect("service builds")
}

pub fn price_upstream(http: &Arc<ScriptedHttp>) -> PriceUpstream {
    price_upstream_with(http, retry_policy(), breaker(5))
}

pub fn price_upstream_with(
    http: &Arc<ScriptedHttp>,
    retry: RetryPolicy,
    breaker: CircuitBreakerConfig,
) -> PriceUpstream {
    PriceUpstream::new(
        Arc::clone(http) as Arc<dyn HttpClient>,
        PriceUpstreamConfig {
            base_url: PRICE_BASE.to_owned(),
            retry,
            breaker,
            throttle: None,
            ..PriceUpstreamConfig::default()
        },
    )
}

/// `/simple/price` and coin-info answers for a coin.
pub fn script_quote(http: &ScriptedHttp, id: &str, symbol: &str, name: &str, price: Value) {
    let ids = format!("ids={id}&");
    let info = format!("/coins/{id}?");
    let mut prices = serde_json::Map::new();
    prices.insert(
        id.to_owned(),
        serde_json::json!({ "usd": price, "usd_24h_change": 2.5 }),
    );
    http.on(&["/simple/price", ids.as_str()], Reply::json(Value::Object(prices)));
    http.on(
        &[info.as_str(), "market_data=false"],
        Reply::json(serde_json::json!({ "id": id, "symbol": symbol, "name": name })),
    );
}

/// ABI-encode words as an `eth_call` JSON-RPC result.
pub fn rpc_result(words: &[i128]) -> Value {
    let data: String = words
        .iter()
        .map(|word| {
            let fill = if *word < 0 { "ff" } else { "00" };
            let low: String = word.to_be_bytes().iter().map(|byte| format!("{byte:02x}")).collect();
            format!("{}{low}", fill.repeat(16))
        })
        .collect();
    serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": format!("0x{data}") })
}
