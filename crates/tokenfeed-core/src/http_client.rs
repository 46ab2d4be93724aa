use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{TransientError, UpstreamError};

/// HTTP methods used by the upstream clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Authentication applied to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpAuth {
    #[default]
    None,
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

/// Request envelope handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// POST with a JSON body and matching content type.
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self::new(HttpMethod::Post, url)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response envelope returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Why a request produced no response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Connect, message)
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

impl From<HttpError> for TransientError {
    fn from(error: HttpError) -> Self {
        match error.kind {
            HttpErrorKind::Timeout => TransientError::timeout(error.message),
            HttpErrorKind::Connect | HttpErrorKind::Other => TransientError::network(error.message),
        }
    }
}

impl From<HttpError> for UpstreamError {
    fn from(error: HttpError) -> Self {
        UpstreamError::Transient(error.into())
    }
}

/// Async transport contract shared by every upstream client.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        (**self).execute(request)
    }
}

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    /// Builds the shared reqwest client. Fails when the TLS backend or
    /// system configuration cannot be initialised.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tokenfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| {
                UpstreamError::invalid_request(format!("http client setup failed: {error}"))
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder = builder.timeout(request.timeout);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::connect(format!("connection failed: {e}"))
                } else {
                    HttpError::new(HttpErrorKind::Other, format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("response body timeout: {e}"))
                } else {
                    HttpError::new(
                        HttpErrorKind::Other,
                        format!("failed to read response body: {e}"),
                    )
                }
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Map a non-success status onto the upstream error taxonomy.
///
/// `resource` names what was requested and is only used for `NotFound`.
pub fn check_status(
    upstream: &str,
    resource: &str,
    response: HttpResponse,
) -> Result<HttpResponse, UpstreamError> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let detail = snippet(&response.body);
    Err(match status {
        404 => UpstreamError::not_found(resource),
        408 => TransientError::timeout(format!("{upstream} returned 408")).into(),
        429 => TransientError::rate_limited(format!("{upstream} returned 429")).into(),
        500..=599 => {
            TransientError::server_error(status, format!("{upstream} returned {status}: {detail}"))
                .into()
        }
        _ => UpstreamError::invalid_request(format!("{upstream} rejected request ({status}): {detail}")),
    })
}

/// Decode a JSON body, reporting shape mismatches as malformed responses.
pub fn decode_json<T: DeserializeOwned>(upstream: &str, body: &str) -> Result<T, UpstreamError> {
    serde_json::from_str(body)
        .map_err(|e| UpstreamError::malformed(upstream, format!("invalid JSON payload: {e}")))
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(160)
        .map(|(index, _)| index)
        .unwrap_or(body.len());
    body[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientKind;

    #[test]
    fn header_auth_is_lowercased() {
        let request = HttpRequest::get("https://example.test/simple/price")
            .with_auth(&HttpAuth::header("X-CG-PRO-API-KEY", "demo"));

        assert_eq!(
            request.headers.get("x-cg-pro-api-key").map(String::as_str),
            Some("demo")
        );
    }

    #[test]
    fn post_json_sets_body_and_content_type() {
        let request =
            HttpRequest::post_json("https://rpc.test", &serde_json::json!({"id": 1}));

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(r#"{"id":1}"#));
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn statuses_are_classified() {
        let classify = |status| check_status("coingecko", "coin 'x'", HttpResponse::new(status, ""));

        assert!(classify(200).is_ok());
        assert!(matches!(classify(404), Err(UpstreamError::NotFound { .. })));
        assert_eq!(
            classify(429).err().and_then(|e| e.transient_cause().map(|c| c.kind)),
            Some(TransientKind::RateLimited)
        );
        assert_eq!(
            classify(408).err().and_then(|e| e.transient_cause().map(|c| c.kind)),
            Some(TransientKind::Timeout)
        );
        assert_eq!(
            classify(503).err().and_then(|e| e.transient_cause().map(|c| c.kind)),
            Some(TransientKind::ServerError { status: 503 })
        );
        assert!(matches!(classify(400), Err(UpstreamError::InvalidRequest(_))));
    }

    #[test]
    fn transport_errors_are_transient() {
        let timeout = UpstreamError::from(HttpError::timeout("slow"));
        let reset = UpstreamError::from(HttpError::connect("refused"));

        assert_eq!(
            timeout.transient_cause().map(|c| c.kind),
            Some(TransientKind::Timeout)
        );
        assert_eq!(
            reset.transient_cause().map(|c| c.kind),
            Some(TransientKind::Network)
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let decoded = decode_json::<serde_json::Value>("coingecko", "{not json");
        assert!(matches!(
            decoded,
            Err(UpstreamError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn reqwest_client_builds_with_default_settings() {
        let built = ReqwestHttpClient::new();

        assert!(built.is_ok(), "{:?}", built.err());
    }
}
