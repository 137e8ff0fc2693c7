//! Minimal JSON HTTP client with safe logging and explicit failure classes.
//!
//! - Request options: headers, bearer auth, cookie header, query params, timeout, retries
//! - Redacts credentials (authorization, cookies, csrf tokens) before logging
//! - Retries 5xx and connection failures with exponential backoff and `Retry-After`
//! - Never retries 429 or timeouts: those surface as [`HttpError::RateLimited`] and
//!   [`HttpError::Timeout`] so callers can apply their own pacing budget
//! - Optional *raw* request/response logging via `MURMUR_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), murmur_http::HttpError> {
//! let client = murmur_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", murmur_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers (including `x-rate-limit-*`), body snippets (truncated),
//! retries and final errors; raw lines go to target `http.raw`.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, RETRY_AFTER, SET_COOKIE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub use reqwest::{header, Method as HttpMethod, StatusCode};

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "MURMUR_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const SECRET_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-csrf-token", "x-guest-token"];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS
        .iter()
        .any(|s| name.eq_ignore_ascii_case(s))
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in headers.iter() {
        let v = if is_secret_header(name.as_str()) {
            "<redacted>".to_string()
        } else {
            val.to_str().unwrap_or("").to_string()
        };
        parts.push(format!(
            "-H '{}: {}'",
            name.as_str(),
            v.replace('\'', r"'\''")
        ));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            // Login bodies carry passwords; only the size is safe to show.
            Ok(s) if s.contains("password") => {
                parts.push(format!("-d '<redacted {} bytes>'", bytes.len()));
            }
            Ok(s) => {
                let mut s = s.to_string();
                if s.len() > RAW_MAX_BODY {
                    s.truncate(floor_char_boundary(&s, RAW_MAX_BODY));
                    s.push_str("...");
                }
                parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited (reset={reset_unix:?}): {message}")]
    RateLimited {
        /// Unix seconds from `x-rate-limit-reset`, when the server sent one.
        reset_unix: Option<i64>,
        message: String,
    },
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Request Options & Responses
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use murmur_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     bearer: Some("token"),
///     query: Some(vec![("q", Cow::Borrowed("rust"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.cookies.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    /// Authorization: Bearer <token>
    pub bearer: Option<&'a str>,
    /// Raw `Cookie` header value (`a=1; b=2`).
    pub cookies: Option<&'a str>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

/// Decoded body plus the response headers (needed for `Set-Cookie`).
#[derive(Debug)]
pub struct JsonResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

impl<T> JsonResponse<T> {
    /// `name=value` pairs from every `Set-Cookie` header, attributes dropped.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        parse_set_cookies(&self.headers)
    }
}

/// Extract `name=value` pairs from `Set-Cookie` headers.
///
/// ```
/// use murmur_http::header::{HeaderMap, HeaderValue, SET_COOKIE};
/// use murmur_http::parse_set_cookies;
///
/// let mut h = HeaderMap::new();
/// h.append(SET_COOKIE, HeaderValue::from_static("ct0=abc; Path=/; Secure"));
/// h.append(SET_COOKIE, HeaderValue::from_static("auth_token=xyz; HttpOnly"));
/// assert_eq!(
///     parse_set_cookies(&h),
///     vec![("ct0".to_string(), "abc".to_string()), ("auth_token".to_string(), "xyz".to_string())]
/// );
/// ```
pub fn parse_set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use murmur_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(Method::GET, path, None, opts)
            .await
            .map(|r| r.body)
    }

    /// Send a request and keep the response headers next to the decoded body.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<JsonResponse<T>, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let request_body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };
        let bearer = match opts.bearer {
            Some(raw) => Some(sanitize_api_key(raw)?),
            None => None,
        };

        let mut attempt = 0usize;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        loop {
            // ----- Build request -----
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(bytes) = &request_body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }
            if let Some(cookies) = opts.cookies.filter(|c| !c.is_empty()) {
                let value = HeaderValue::from_str(cookies)
                    .map_err(|e| HttpError::Build(format!("invalid cookie header: {e}")))?;
                rb = rb.header(COOKIE, value);
            }

            let query_keys: Vec<&str> = opts
                .query
                .as_ref()
                .map(|q| q.iter().map(|(k, _)| *k).collect())
                .unwrap_or_default();

            // Lightweight request id without extra deps
            let req_id = format!(
                "r{:x}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos()
            );

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.domain().unwrap_or("-"), url.path()),
                query_keys=?query_keys,
                timeout_ms=timeout.as_millis() as u64,
                has_bearer=bearer.is_some(),
                has_cookies=opts.cookies.is_some(),
                has_body=%body.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(
                    &method,
                    &url,
                    opts.headers.as_ref().unwrap_or(&HeaderMap::new()),
                    request_body_bytes.as_deref(),
                );
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) if err.is_timeout() => {
                    tracing::warn!(req_id=%req_id, message=%err, "http.timeout.send");
                    return Err(HttpError::Timeout(err.to_string()));
                }
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, max_retries, message=%message, "http.network_error.send");
                    return Err(HttpError::Network(message));
                }
            };
            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(err) if err.is_timeout() => {
                    tracing::warn!(req_id=%req_id, message=%err, "http.timeout.body");
                    return Err(HttpError::Timeout(err.to_string()));
                }
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, max_retries, message=%message, "http.network_error.body");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let req_hdr_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-transaction-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            let limit = header_str(&headers, "x-rate-limit-limit");
            let remain = header_str(&headers, "x-rate-limit-remaining");
            let reset = header_str(&headers, "x-rate-limit-reset");

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%req_hdr_id,
                rate_limit.limit=?limit,
                rate_limit.remaining=?remain,
                rate_limit.reset=?reset,
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&headers);
                let cut = bytes.len().min(RAW_MAX_BODY);
                let text = String::from_utf8_lossy(&bytes[..cut]);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated=bytes.len() > RAW_MAX_BODY
                );
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

            // ----- Success path -----
            if status.is_success() {
                let body = serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id=%req_id,
                        serde_line=%e.line(),
                        serde_col=%e.column(),
                        serde_err=%e.to_string(),
                        body_snippet=%snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet.clone())
                })?;
                return Ok(JsonResponse {
                    status,
                    headers,
                    body,
                });
            }

            let message = extract_error_message(&bytes);

            // ----- Rate limited: caller decides how long to wait -----
            if status == StatusCode::TOO_MANY_REQUESTS {
                let reset_unix = reset.and_then(|r| r.trim().parse::<i64>().ok());
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    ?reset_unix,
                    message=%message,
                    "http.rate_limited"
                );
                return Err(HttpError::RateLimited {
                    reset_unix,
                    message,
                });
            }

            // ----- 5xx: maybe retry -----
            if status.is_server_error() && attempt < max_retries {
                attempt += 1;
                let delay = retry_after_delay_secs(&headers)
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%req_hdr_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: req_hdr_id.to_string(),
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn header_str<'h>(h: &'h HeaderMap, name: &str) -> Option<&'h str> {
    h.get(name).and_then(|v| v.to_str().ok())
}

fn extract_error_message(body: &[u8]) -> String {
    // Twitter: {"errors":[{"message":"...", "code": 88}]}
    #[derive(Deserialize)]
    struct TwErrors {
        errors: Vec<TwErr>,
    }
    #[derive(Deserialize)]
    struct TwErr {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        title: String,
    }

    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(tw) = serde_json::from_slice::<TwErrors>(body) {
        if let Some(first) = tw.errors.into_iter().next() {
            for candidate in [first.message, first.detail, first.title] {
                if !candidate.is_empty() {
                    return candidate;
                }
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(floor_char_boundary(&snip, 500));
        snip.push_str("...");
    }
    snip
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
