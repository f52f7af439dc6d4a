//! Authenticated JSON client.

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use url::Url;

use super::auth::{password_grant, AccessToken, TokenResponse};
use super::ApiFamily;
use crate::config::ConnectionSettings;
use crate::error::ProviderError;
use crate::logging::sanitize_for_log;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Items on this page.
    pub items: Vec<Value>,
    /// Total number of items across all pages, when the server reports it.
    pub total: Option<u64>,
}

/// HTTP client bound to one Veeam server.
///
/// Clones share the connection pool and the cached token.
#[derive(Clone)]
pub struct VeeamClient {
    http: reqwest::Client,
    family: ApiFamily,
    base_url: Url,
    api_base: Url,
    username: String,
    password: String,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl std::fmt::Debug for VeeamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeeamClient")
            .field("family", &self.family)
            .field("api_base", &self.api_base.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl VeeamClient {
    /// Create a client for a validated connection.
    pub fn new(settings: ConnectionSettings) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if settings.family == ApiFamily::Vbr {
            let version = HeaderValue::from_str(&settings.api_version).map_err(|_| {
                ProviderError::Configuration(format!(
                    "invalid VBR api_version '{}'",
                    settings.api_version
                ))
            })?;
            headers.insert("x-api-version", version);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("hemmer-provider-veeam/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .build()?;

        let api_base = settings
            .base_url
            .join(&settings.family.api_root(&settings.api_version))
            .map_err(|e| ProviderError::Configuration(format!("invalid API root: {}", e)))?;

        Ok(Self {
            http,
            family: settings.family,
            base_url: settings.base_url,
            api_base,
            username: settings.username,
            password: settings.password,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// The product this client talks to.
    pub fn family(&self) -> ApiFamily {
        self.family
    }

    /// Resolve an API path such as `/repositories/{id}` against the API root.
    pub fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid path '{}': {}", path, e)))
    }

    /// GET a JSON document.
    pub async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.request(Method::GET, path, query, None).await
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    /// PUT a JSON body.
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    /// DELETE an object.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.request(Method::DELETE, path, &[], None).await.map(|_| ())
    }

    /// Fetch one page of a list endpoint.
    pub async fn list_page(
        &self,
        path: &str,
        query: &[(String, String)],
        offset: u64,
        limit: u64,
    ) -> Result<Page, ProviderError> {
        let paging = self.family.paging();
        let mut query = query.to_vec();
        query.push((paging.offset_param.to_string(), offset.to_string()));
        query.push((paging.limit_param.to_string(), limit.to_string()));

        let body = self.get(path, &query).await?;
        let items = match body.get(paging.items_key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let total = body.pointer(paging.total_pointer).and_then(Value::as_u64);
        Ok(Page { items, total })
    }

    /// Fetch every item of a list endpoint starting at `offset`.
    pub async fn list_all(
        &self,
        path: &str,
        query: &[(String, String)],
        offset: u64,
        page_size: u64,
    ) -> Result<Page, ProviderError> {
        let mut items = Vec::new();
        let mut next = offset;
        let mut total = None;

        loop {
            let page = self.list_page(path, query, next, page_size).await?;
            let fetched = page.items.len() as u64;
            total = page.total.or(total);
            items.extend(page.items);
            next += fetched;

            let exhausted = match total {
                Some(total) => next >= total,
                None => fetched < page_size,
            };
            if fetched == 0 || exhausted {
                break;
            }
        }

        debug!(path, count = items.len(), "Listed all pages");
        Ok(Page { items, total })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let url = self.endpoint(path)?;

        // A 401 on a cached token means the server dropped it; retry once with a new one.
        for attempt in 0..2 {
            let token = self.bearer_token().await?;
            debug!(%method, url = %url, attempt, "Sending request");

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!(url = %url, "Token rejected, re-authenticating");
                self.token.lock().await.take();
                continue;
            }

            return parse_response(status, &text, &method, &url);
        }

        Err(ProviderError::PermissionDenied(format!(
            "{} rejected the access token",
            self.family.product_name()
        )))
    }

    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value().to_string());
        }

        let token = self.authenticate().await?;
        let value = token.value().to_string();
        *cached = Some(token);
        Ok(value)
    }

    async fn authenticate(&self) -> Result<AccessToken, ProviderError> {
        let url = self
            .base_url
            .join(ApiFamily::TOKEN_PATH)
            .map_err(|e| ProviderError::Configuration(format!("invalid token URL: {}", e)))?;
        debug!(url = %url, username = %self.username, "Requesting access token");

        let issued_at = Instant::now();
        let response = self
            .http
            .post(url)
            .form(&password_grant(&self.username, &self.password))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %sanitize_for_log(&text), "Authentication failed");
            return Err(ProviderError::PermissionDenied(format!(
                "authentication against {} failed: {}",
                self.family.product_name(),
                error_message(status, &text)
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        Ok(AccessToken::from_response(token, issued_at))
    }
}

fn parse_response(
    status: StatusCode,
    text: &str,
    method: &Method,
    url: &Url,
) -> Result<Value, ProviderError> {
    if !status.is_success() {
        if status == StatusCode::NOT_FOUND {
            debug!(%method, url = %url, "Object not found");
        } else {
            error!(%method, url = %url, %status, body = %sanitize_for_log(text), "API error");
        }
        return Err(ProviderError::from_status(
            status.as_u16(),
            error_message(status, text),
        ));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

/// Pull a readable message out of a Veeam error body.
///
/// VBR answers `{"errorCode": .., "message": ..}`, the Azure API uses
/// problem details (`title`), and the token endpoint uses OAuth2 fields.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "title", "error_description", "errorCode", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
