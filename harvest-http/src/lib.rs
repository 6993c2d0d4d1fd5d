//! JSON-over-HTTP client shared by the Twitter and Supabase adapters.
//!
//! Every request is anchored to the client's base URL and carries its own
//! [`RequestOpts`]: auth, extra headers, query pairs, timeout and retry budget.
//! Retries are off unless asked for; when enabled, 429 and 5xx responses and
//! transport failures are retried with exponential backoff, honouring
//! `Retry-After` when the server sends one.
//!
//! ```rust
//! # async fn demo() -> Result<(), harvest_http::HttpError> {
//! let client = harvest_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", harvest_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Logs never contain credentials: `Authorization`, `apikey` and `x-api-key`
//! values and secret-looking query parameters are replaced with `<redacted>`.
//! Setting `HARVEST_HTTP_RAW=1` adds a curl line per request and the full
//! response under target `http.raw`.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const RAW_ENV: &str = "HARVEST_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_LEN: usize = 500;
const REDACTED: &str = "<redacted>";

const SECRET_HEADERS: &[&str] = &["authorization", "apikey", "x-api-key"];
const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "bearer",
    "client_secret",
    "key",
    "secret",
    "token",
];
const REQUEST_ID_HEADERS: &[&str] = &["x-request-id", "x-correlation-id", "sb-request-id"];

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for API errors, `None` for transport/decode failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How a request authenticates.
///
/// ```
/// use harvest_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert!(matches!(bearer, Auth::Bearer("token")));
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
    None,
}

/// Per-request overrides; unset fields fall back to the client defaults.
///
/// ```
/// use harvest_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Some(Auth::Bearer("demo")),
///     query: Some(vec![("select", "tweet_data,username".into())]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

/// Everything about a request that stays fixed across retries.
struct Prepared<'o> {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    bearer: Option<String>,
    timeout: Duration,
    opts: &'o RequestOpts<'o>,
}

/// What one attempt produced on the wire.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// A trailing slash is added to the base so that relative paths are
    /// appended instead of replacing its last segment.
    ///
    /// ```no_run
    /// use harvest_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://project.supabase.co/rest/v1")?;
    /// assert_eq!(client.base().as_str(), "https://project.supabase.co/rest/v1/");
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::Url(format!("not a base URL: {base}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Retry budget for requests that do not set their own (0 disables retries).
    ///
    /// ```no_run
    /// use harvest_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(3);
    /// assert_eq!(client.max_retries, 3);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.execute::<(), T>(Method::GET, path, None, &opts).await
    }

    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body), &opts).await
    }

    fn prepare<'o, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: &'o RequestOpts<'o>,
    ) -> Result<Prepared<'o>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let bearer = match opts.auth {
            Some(Auth::Bearer(token)) => Some(sanitize_api_key(token)?),
            Some(Auth::None) | None => None,
        };
        Ok(Prepared {
            method,
            url,
            body,
            bearer,
            timeout: opts.timeout.unwrap_or(self.default_timeout),
            opts,
        })
    }

    async fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: &RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.prepare(method, path, body, opts)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let mut attempt = 0usize;

        loop {
            let req_id = next_request_id();
            let exchange = match self.send_once(&req, &req_id, attempt).await {
                Ok(exchange) => exchange,
                Err(message) if attempt < max_retries => {
                    attempt += 1;
                    let delay = backoff(attempt);
                    tracing::warn!(%req_id, attempt, max_retries, delay_ms = delay.as_millis() as u64, %message, "http.retry.network");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(message) => {
                    tracing::warn!(%req_id, attempt, %message, "http.error.network");
                    return Err(HttpError::Network(message));
                }
            };

            let snippet = snip_body(&exchange.body);
            if exchange.status.is_success() {
                return serde_json::from_slice::<T>(&exchange.body).map_err(|e| {
                    tracing::warn!(%req_id, line = e.line(), column = e.column(), error = %e, body_snippet = %snippet, "http.response.decode_error");
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&exchange.body);
            if let Some(delay) = retry_delay(exchange.status, &exchange.headers, attempt, max_retries) {
                attempt += 1;
                tracing::warn!(%req_id, status = %exchange.status, attempt, max_retries, delay_ms = delay.as_millis() as u64, %message, "http.retry.status");
                tokio::time::sleep(delay).await;
                continue;
            }

            let request_id = server_request_id(&exchange.headers).to_string();
            tracing::warn!(%req_id, status = %exchange.status, %message, x_request_id = %request_id, body_snippet = %snippet, "http.error.status");
            return Err(HttpError::Api {
                status: exchange.status,
                message,
                request_id,
            });
        }
    }

    /// One round trip. `Err` carries a transport failure message.
    async fn send_once(
        &self,
        req: &Prepared<'_>,
        req_id: &str,
        attempt: usize,
    ) -> Result<Exchange, String> {
        let mut rb = self
            .inner
            .request(req.method.clone(), req.url.clone())
            .timeout(req.timeout);
        if let Some(query) = &req.opts.query {
            let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(bytes) = &req.body {
            rb = rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone());
        }
        if let Some(headers) = &req.opts.headers {
            rb = rb.headers(headers.clone());
        }
        if let Some(token) = &req.bearer {
            rb = rb.bearer_auth(token);
        }

        tracing::debug!(
            %req_id,
            attempt = attempt + 1,
            method = %req.method,
            host_path = %format!("{}{}", req.url.host_str().unwrap_or("-"), req.url.path()),
            query = ?redact_query(req.opts.query.as_deref()),
            timeout_ms = req.timeout.as_millis() as u64,
            bearer = req.bearer.is_some(),
            has_body = req.body.is_some(),
            "http.request.start"
        );
        if raw_enabled() {
            let headers = req.opts.headers.clone().unwrap_or_default();
            let curl = make_curl(&req.method, &req.url, &headers, req.body.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let started = Instant::now();
        let resp = rb.send().await.map_err(|e| e.to_string())?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        let exchange = Exchange {
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        };
        log_response(req_id, &exchange);
        Ok(exchange)
    }
}

fn log_response(req_id: &str, ex: &Exchange) {
    let header = |name: &str| ex.headers.get(name).and_then(|v| v.to_str().ok());
    tracing::debug!(
        %req_id,
        status = %ex.status,
        duration_ms = ex.elapsed.as_millis() as u64,
        body_len = ex.body.len(),
        x_request_id = %server_request_id(&ex.headers),
        rate_limit.limit = ?header("x-rate-limit-limit"),
        rate_limit.remaining = ?header("x-rate-limit-remaining"),
        rate_limit.reset = ?header("x-rate-limit-reset"),
        "http.response"
    );
    if raw_enabled() {
        let shown = &ex.body[..ex.body.len().min(RAW_MAX_BODY)];
        tracing::info!(
            target: "http.raw",
            %req_id,
            status = %ex.status,
            headers = ?redact_headers(&ex.headers),
            body = %String::from_utf8_lossy(shown),
            truncated = ex.body.len() > RAW_MAX_BODY
        );
    }
}

/// Delay before the next attempt, or `None` when the response is final.
fn retry_delay(
    status: StatusCode,
    headers: &HeaderMap,
    attempt: usize,
    max_retries: usize,
) -> Option<Duration> {
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS;
    if attempt >= max_retries || !(rate_limited || status.is_server_error()) {
        return None;
    }
    let next = attempt + 1;
    Some(match retry_after(headers) {
        Some(wait) => wait,
        None if rate_limited => backoff(next).max(Duration::from_millis(1100)),
        None => backoff(next),
    })
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn next_request_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r{nanos:x}")
}

fn server_request_id(headers: &HeaderMap) -> &str {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Pull a human-readable message out of Twitter or PostgREST error bodies.
fn extract_error_message(body: &[u8]) -> String {
    // Twitter: {"errors":[{"message":..., "detail":..., "title":...}]}
    #[derive(Deserialize)]
    struct TwitterErrors {
        errors: Vec<TwitterError>,
    }
    #[derive(Deserialize)]
    struct TwitterError {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        title: String,
    }

    // PostgREST: {"code":...,"message":...,"details":...,"hint":...}
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        details: Option<String>,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(tw) = serde_json::from_slice::<TwitterErrors>(body) {
        let first = tw.errors.into_iter().next();
        if let Some(msg) = first
            .into_iter()
            .flat_map(|e| [e.message, e.detail, e.title])
            .find(|s| !s.is_empty())
        {
            return msg;
        }
    }
    if let Ok(flat) = serde_json::from_slice::<Flat>(body) {
        match flat {
            Flat { message, details: Some(details), .. }
                if !message.is_empty() && !details.is_empty() =>
            {
                return format!("{message} ({details})");
            }
            Flat { message, .. } if !message.is_empty() => return message,
            Flat { detail, .. } if !detail.is_empty() => return detail,
            Flat { error, .. } if !error.is_empty() => return error,
            _ => {}
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).into_owned();
    if snip.len() > SNIPPET_LEN {
        let mut cut = SNIPPET_LEN;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let key: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if key.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !key.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if key.bytes().any(|b| b.is_ascii_control()) {
        return Err(HttpError::Build("API key contains control characters".into()));
    }
    HeaderValue::from_str(&format!("Bearer {key}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(key)
}

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1" | "true" | "yes")
    )
}

fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str();
            let shown = if SECRET_HEADERS.iter().any(|s| name.eq_ignore_ascii_case(s)) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or_default().to_string()
            };
            (name.to_string(), shown)
        })
        .collect()
}

fn redact_query(query: Option<&[(&str, Cow<'_, str>)]>) -> Vec<(String, String)> {
    query
        .unwrap_or_default()
        .iter()
        .map(|(key, value)| {
            let secret = SECRET_QUERY_KEYS
                .iter()
                .any(|s| key.eq_ignore_ascii_case(s));
            let shown = if secret { REDACTED } else { value.as_ref() };
            (key.to_string(), shown.to_string())
        })
        .collect()
}

/// Curl line for reproducing a request by hand; secret headers are redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', r"'\''"));
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    for (name, value) in redact_headers(headers) {
        parts.push(format!("-H {}", quote(&format!("{name}: {value}"))));
    }
    match body.map(std::str::from_utf8) {
        Some(Ok(text)) => {
            let mut text = text.to_string();
            if text.len() > RAW_MAX_BODY {
                let mut cut = RAW_MAX_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
                text.push_str("...");
            }
            parts.push(format!("-d {}", quote(&text)));
        }
        Some(Err(_)) => parts.push("--data-binary @-".to_string()),
        None => {}
    }
    parts.push(quote(url.as_str()));
    parts.join(" ")
}
