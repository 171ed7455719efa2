//! Authenticated request dispatch against the SafeRoute backend.
//!
//! Every call goes through [`ApiClient::request`], which:
//!
//! 1. joins the normalized endpoint onto the configured base URL,
//! 2. applies caller headers, then `Content-Type: application/json` if unset,
//! 3. unless `skip_auth` is set, adds `Authorization: Bearer <token>` from the
//!    credential store and `X-Device-Id` from the device identity,
//! 4. sends with the configured (or per-call) timeout,
//! 5. returns the response untouched on 2xx and [`ApiError::Status`] otherwise.
//!
//! Nothing is retried. Each step is awaited in order within one call; separate
//! calls are independent.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::credentials::{CredentialKey, CredentialStore};
use crate::device::DeviceIdentity;

use super::request::{RequestOptions, normalize_endpoint, redact_headers};
use super::ApiError;

/// Header carrying the persistent install identifier.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Dispatcher for the SafeRoute REST API.
///
/// Clone is cheap: the HTTP connection pool, credential backend and device
/// identity are all shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<ApiConfig>,
    credentials: CredentialStore,
    device: DeviceIdentity,
}

impl ApiClient {
    /// Create a client with its own device identity over `credentials`.
    pub fn new(config: ApiConfig, credentials: CredentialStore) -> Result<Self, ApiError> {
        let device = DeviceIdentity::new(credentials.clone());
        Self::with_device_identity(config, credentials, device)
    }

    /// Create a client that shares an existing device identity.
    pub fn with_device_identity(
        config: ApiConfig,
        credentials: CredentialStore,
        device: DeviceIdentity,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("saferoute/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            config: Arc::new(config),
            credentials,
            device,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Absolute URL for `endpoint`.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url(), normalize_endpoint(endpoint))
    }

    /// Dispatch a request and return the raw response.
    ///
    /// Non-2xx responses are returned as [`ApiError::Status`] with the body
    /// truncated for diagnostics.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        let url = self.url_for(endpoint);
        let headers = self.build_headers(&options).await?;
        let timeout = options.timeout.unwrap_or(self.config.request_timeout());

        debug!(
            method = %options.method,
            url = %url,
            headers = ?redact_headers(&headers),
            "API request"
        );

        let mut builder = self
            .client
            .request(options.method.to_reqwest(), &url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    url: url.clone(),
                    timeout,
                }
            } else if e.is_builder() {
                ApiError::InvalidUrl {
                    url: url.clone(),
                    message: e.to_string(),
                }
            } else {
                ApiError::Network(e)
            }
        })?;

        Self::check_response(&url, response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(url: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(url = url, status = status.as_u16(), "API request failed");
        Err(ApiError::from_status(status, &body))
    }

    async fn build_headers(&self, options: &RequestOptions) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();

        for (name, value) in &options.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        if options.skip_auth {
            headers.remove(AUTHORIZATION);
            return Ok(headers);
        }

        if let Some(token) = self.credentials.get(CredentialKey::AccessToken).await {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|e| ApiError::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                    message: e.to_string(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let device_id = self.device.get_or_create().await;
        let value = HeaderValue::from_str(device_id).map_err(|e| ApiError::InvalidHeader {
            name: DEVICE_ID_HEADER.to_string(),
            message: e.to_string(),
        })?;
        headers.insert(HeaderName::from_static(DEVICE_ID_HEADER), value);

        Ok(headers)
    }

    // ===== Convenience wrappers =====

    pub async fn get(&self, endpoint: &str) -> Result<Response, ApiError> {
        self.request(endpoint, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.request(endpoint, RequestOptions::post().json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.request(endpoint, RequestOptions::put().json(body)?).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Response, ApiError> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    // ===== Typed helpers =====

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response = self.get(endpoint).await?;
        Self::decode(response).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.post(endpoint, body).await?;
        Self::decode(response).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.put(endpoint, body).await?;
        Self::decode(response).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response = self.delete(endpoint).await?;
        Self::decode(response).await
    }

    /// Dispatch with explicit options and decode the JSON body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.request(endpoint, options).await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        let text = response.text().await.map_err(ApiError::Network)?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url())
            .field("request_timeout", &self.config.request_timeout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn client(base_url: &str) -> ApiClient {
        let config = ApiConfig::new(base_url).unwrap();
        let credentials = CredentialStore::from_store(MemoryStore::new());
        ApiClient::new(config, credentials).unwrap()
    }

    #[test]
    fn test_url_for_joins_with_single_separator() {
        let client = client("http://localhost:20000/");
        assert_eq!(client.url_for("users/update"), "http://localhost:20000/users/update");
        assert_eq!(client.url_for("/v1/users/me"), "http://localhost:20000/v1/users/me");
    }

    #[tokio::test]
    async fn test_headers_with_token() {
        let client = client("http://localhost:20000");
        client
            .credentials()
            .set(CredentialKey::AccessToken, "abc123")
            .await;

        let headers = client.build_headers(&RequestOptions::get()).await.unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc123");
        assert_eq!(headers[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(headers[DEVICE_ID_HEADER].to_str().unwrap().len(), 36);
    }

    #[tokio::test]
    async fn test_headers_skip_auth() {
        let client = client("http://localhost:20000");
        client
            .credentials()
            .set(CredentialKey::AccessToken, "abc123")
            .await;

        let options = RequestOptions::get()
            .header("Authorization", "Bearer caller")
            .skip_auth();
        let headers = client.build_headers(&options).await.unwrap();

        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(DEVICE_ID_HEADER));
        assert_eq!(headers[CONTENT_TYPE], JSON_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_caller_content_type_kept() {
        let client = client("http://localhost:20000");
        let options = RequestOptions::post()
            .header("content-type", "text/plain")
            .raw_body("hello");

        let headers = client.build_headers(&options).await.unwrap();
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_invalid_header_rejected() {
        let client = client("http://localhost:20000");
        let options = RequestOptions::get().header("bad header", "x");

        let result = client.build_headers(&options).await;
        assert!(matches!(result, Err(ApiError::InvalidHeader { .. })));
    }
}
