//! Shared reqwest plumbing for the vendor providers.
//!
//! [`VendorClient`] is a configured `reqwest::Client` plus a base URL. It
//! sends JSON and decodes JSON, and reports every failure as a
//! [`VendorError`] for [`classify_error`](crate::provider_errors::classify_error).
//!
//! [`LazyClient`] owns the credential-resolution and caching rules every
//! provider shares: the client is built on first use, at most once.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use thinktank_types::{ApiKey, ThinktankError};

use crate::provider_errors::{ProviderInfo, VendorError, missing_api_key_error, unknown_error};

/// How the API key is presented to the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// The raw key in the named header (`x-api-key`, `x-goog-api-key`).
    Header(&'static str),
}

/// A ready-to-use HTTP client for one vendor and one key.
#[derive(Clone)]
pub struct VendorClient {
    http: reqwest::Client,
    base_url: String,
}

impl VendorClient {
    /// Build a client whose every request carries the auth header and
    /// `extra_headers`.
    pub fn build(
        info: &ProviderInfo,
        base_url: &str,
        auth: AuthScheme,
        api_key: &ApiKey,
        extra_headers: &[(&'static str, String)],
    ) -> Result<Self, ThinktankError> {
        let invalid_header = |name: &str| {
            unknown_error(
                info,
                &format!("could not build the {name} request header"),
                None,
            )
        };

        let mut headers = HeaderMap::new();
        let (name, value) = match auth {
            AuthScheme::Bearer => (
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose()),
            ),
            AuthScheme::Header(name) => (
                HeaderName::from_static(name),
                api_key.expose().to_string(),
            ),
        };
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| invalid_header(name.as_str()).with_suggestion(
                "The API key contains characters that are not valid in an HTTP header",
            ))?;
        value.set_sensitive(true);
        headers.insert(name, value);

        for (name, value) in extra_headers {
            let value = HeaderValue::from_str(value).map_err(|_| invalid_header(*name))?;
            headers.insert(HeaderName::from_static(*name), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                unknown_error(
                    info,
                    "could not initialise the HTTP client",
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST `body` as JSON to `{base}/{path}` and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, VendorError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self.http.post(&url).json(body).send().await?;
        decode_response(response).await
    }

    /// GET `{base}/{path}` and decode the JSON response.
    pub async fn get_json<T>(&self, path: &str) -> Result<T, VendorError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.http.get(&url).send().await?;
        decode_response(response).await
    }
}

impl std::fmt::Debug for VendorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, VendorError> {
    let status = response.status();
    let retry_after = parse_retry_after_header(&response);
    let body = response.text().await?;

    if !status.is_success() {
        let mut message = extract_error_message(&body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
        if let Some(secs) = retry_after {
            message.push_str(&format!(" (retry after {secs}s)"));
        }
        warn!(status = status.as_u16(), message = %message, "vendor returned an error status");
        return Err(VendorError::Http {
            status: status.as_u16(),
            message,
            body,
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| VendorError::Decode(format!("failed to parse response: {e}")))
}

/// Pull a readable message out of a vendor error body.
///
/// Handles the common shapes:
/// `{"error": {"message": "...", "type"|"status"|"code": ...}}` (OpenAI,
/// Anthropic, Google), `{"error": "..."}`, and a top-level `"message"`. The
/// type/status tag is kept in front of the message since it often carries
/// the classifying word (`rate_limit_error`, `RESOURCE_EXHAUSTED`).
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error");

    if let Some(text) = error.and_then(|e| e.as_str()) {
        return Some(text.to_string());
    }

    let (obj, message) = match error {
        Some(e) => (e, e.get("message").and_then(|m| m.as_str())),
        None => (&value, value.get("message").and_then(|m| m.as_str())),
    };
    let message = message?;

    let tag = ["type", "status", "code"]
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        });

    Some(match tag {
        Some(tag) => format!("{tag}: {message}"),
        None => message.to_string(),
    })
}

/// Numeric `Retry-After` (seconds). HTTP-date values are ignored.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let value = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?;
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
}

/// Builds and caches a provider's [`VendorClient`].
///
/// Credentials come from the explicit key given at construction, else from
/// the provider's env var at first use. A missing key fails before any
/// client is built, and the failure is not cached: setting the variable and
/// calling again works.
pub struct LazyClient {
    info: &'static ProviderInfo,
    api_key: Option<ApiKey>,
    base_url: String,
    auth: AuthScheme,
    extra_headers: Vec<(&'static str, String)>,
    cell: OnceCell<VendorClient>,
}

impl LazyClient {
    pub fn new(
        info: &'static ProviderInfo,
        api_key: Option<String>,
        base_url: impl Into<String>,
        auth: AuthScheme,
    ) -> Self {
        Self {
            info,
            api_key: api_key.and_then(ApiKey::new),
            base_url: base_url.into(),
            auth,
            extra_headers: Vec::new(),
            cell: OnceCell::new(),
        }
    }

    /// Add a header sent on every request. Header names must be lower-case.
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    /// Point at a different endpoint (tests, proxies). Has no effect once
    /// the client has been built.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_explicit_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether the cached client exists yet.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    fn resolve_key(&self) -> Result<ApiKey, ThinktankError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        ApiKey::from_env(self.info.api_key_env).ok_or_else(|| missing_api_key_error(self.info))
    }

    /// The cached client, building it on first call.
    pub async fn get(&self) -> Result<&VendorClient, ThinktankError> {
        self.cell
            .get_or_try_init(|| async {
                let key = self.resolve_key()?;
                debug!(
                    provider = self.info.id,
                    base_url = %self.base_url,
                    "initialising vendor client"
                );
                VendorClient::build(
                    self.info,
                    &self.base_url,
                    self.auth,
                    &key,
                    &self.extra_headers,
                )
            })
            .await
    }

    /// A fresh, uncached client for an explicitly supplied key.
    pub fn one_off(&self, api_key: &str) -> Result<VendorClient, ThinktankError> {
        let key = ApiKey::new(api_key).ok_or_else(|| missing_api_key_error(self.info))?;
        VendorClient::build(
            self.info,
            &self.base_url,
            self.auth,
            &key,
            &self.extra_headers,
        )
    }
}

impl std::fmt::Debug for LazyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyClient")
            .field("provider", &self.info.id)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
