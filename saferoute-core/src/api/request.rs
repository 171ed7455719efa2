//! Request description and header helpers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::Serialize;

use super::ApiError;

/// Number of token characters kept visible in request logs.
const LOGGED_TOKEN_PREFIX: usize = 8;

/// HTTP methods the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Options for a single dispatch.
///
/// Header overrides are kept as strings and validated when the request is
/// built, so constructing options never fails.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Pre-serialized request body.
    pub body: Option<String>,
    /// Caller header overrides, applied before the defaults.
    pub headers: Vec<(String, String)>,
    /// Send without `Authorization` or `X-Device-Id`.
    pub skip_auth: bool,
    /// Replaces the configured request timeout for this call.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    pub fn put() -> Self {
        Self::new(Method::Put)
    }

    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    /// Serialize `body` as JSON.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// Use `body` verbatim.
    pub fn raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Give `endpoint` exactly one leading `/`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    format!("/{}", endpoint.trim_start_matches('/'))
}

/// Visible part of a token: at most [`LOGGED_TOKEN_PREFIX`] characters and
/// never more than half of it.
fn token_prefix(token: &str) -> String {
    let visible = LOGGED_TOKEN_PREFIX.min(token.chars().count() / 2);
    token.chars().take(visible).collect()
}

/// Header set as it should appear in logs.
///
/// The bearer token is cut to a short prefix; a missing `Authorization`
/// header is shown as `MISSING`.
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut redacted: BTreeMap<String, String> = headers
        .iter()
        .filter(|(name, _)| **name != AUTHORIZATION)
        .map(|(name, value)| {
            let shown = value.to_str().unwrap_or("<non-utf8>").to_string();
            (name.as_str().to_string(), shown)
        })
        .collect();

    let auth = match headers.get(AUTHORIZATION).map(|v| v.to_str()) {
        None => "MISSING".to_string(),
        Some(Ok(value)) => match value.strip_prefix("Bearer ") {
            Some(token) => format!("Bearer {}...", token_prefix(token)),
            None => "[REDACTED]".to_string(),
        },
        Some(Err(_)) => "[REDACTED]".to_string(),
    };
    redacted.insert(AUTHORIZATION.as_str().to_string(), auth);

    redacted
}
