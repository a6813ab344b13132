//! Authenticated HTTP client for the pagepulse backend.
//!
//! Every request carries `Content-Type: application/json` and, when the token
//! store holds one, `Authorization: Bearer <token>`. A 401 triggers at most one
//! token refresh per client (shared by every request that fails while it runs)
//! and at most one retry per call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{Credentials, TokenStore};
use crate::config::{normalize_base_url, Config};

use super::refresh::{RefreshCoordinator, Ticket};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh endpoint, relative to the API base
const REFRESH_PATH: &str = "/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

/// API client for the pagepulse backend.
///
/// Clone is cheap. Clones share the connection pool, the token store and the
/// refresh state, so a burst of 401s across clones still yields one refresh.
/// Separately constructed clients never share refresh state.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS), store)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            store,
            refresh: Arc::new(RefreshCoordinator::new()),
        })
    }

    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::with_timeout(&config.api_base(), config.timeout(), store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    /// Store freshly issued credentials (after login)
    pub fn set_credentials(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.store
            .save(credentials)
            .map_err(|e| ApiError::Storage(format!("{e:#}")))
    }

    /// Forget the stored access and refresh tokens
    pub fn logout(&self) -> Result<(), ApiError> {
        self.store
            .clear()
            .map_err(|e| ApiError::Storage(format!("{e:#}")))?;
        info!("Logged out");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ===== Request Pipeline =====

    /// Send a request to `path` and parse the JSON response.
    ///
    /// A 401 is recovered from by refreshing the access token once and
    /// retrying once; callers only see `ApiError::Unauthorized` when that
    /// fails. Network errors and other statuses are returned as-is.
    pub async fn request<T, B, Q>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: Option<&Q>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let send = |token: Option<String>| {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request.send()
        };

        let sent_at = self.refresh.generation();
        let token = self.store.access_token();
        debug!(%method, url = %url, authenticated = token.is_some(), "Sending request");
        let response = send(token.clone()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::read_json(response).await;
        }

        let original = Self::error_from(response).await;
        let Some(retry_token) = self.recover_from_unauthorized(token.as_deref(), sent_at).await else {
            return Err(original);
        };

        debug!(%method, url = %url, "Retrying with refreshed token");
        let response = send(Some(retry_token)).await?;
        Self::read_json(response).await
    }

    /// Obtain a token to retry with after a 401, or `None` if the session
    /// cannot be recovered.
    ///
    /// The store is only read outside the coordinator lock, since reads may
    /// block (keychain). `sent_at` tells the coordinator whether a refresh
    /// settled after this request was sent.
    async fn recover_from_unauthorized(
        &self,
        sent_with: Option<&str>,
        sent_at: u64,
    ) -> Option<String> {
        let replaced = |current: Option<String>| current.filter(|c| sent_with != Some(c.as_str()));

        if let Some(token) = replaced(self.store.access_token()) {
            debug!("Token already replaced");
            return Some(token);
        }

        match self.refresh.begin(sent_at) {
            Ticket::Settled => {
                debug!("Refresh settled after the request was sent");
                replaced(self.store.access_token())
            }
            Ticket::Waiter(rx) => rx.await.ok().flatten(),
            Ticket::Owner(guard) => {
                let outcome = match self.refresh_access_token().await {
                    Ok(token) => {
                        info!("Access token refreshed");
                        Some(token)
                    }
                    Err(e) => {
                        warn!(error = %e, "Token refresh failed, clearing session");
                        if let Err(e) = self.store.clear() {
                            warn!(error = %e, "Failed to clear stored credentials");
                        }
                        None
                    }
                };
                guard.finish(outcome.clone());
                outcome
            }
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Bypasses the 401 handling above and never sends the bearer token, so a
    /// rejected refresh cannot recurse into another refresh.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let refresh_token = self.store.refresh_token().ok_or(ApiError::NoRefreshToken)?;

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await?;
        let refreshed: RefreshResponse = Self::read_json(response).await?;

        let result = match refreshed.refresh {
            Some(rotated) => self
                .store
                .save(&Credentials::new(refreshed.access.clone(), Some(rotated))),
            None => self.store.set_access_token(&refreshed.access),
        };
        result.map_err(|e| ApiError::Storage(format!("{e:#}")))?;

        Ok(refreshed.access)
    }

    /// Send an unauthenticated POST that is never refreshed or retried.
    /// Used for login and signup, where a 401 means bad credentials.
    pub(crate) async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(url = %url, "Sending public request");
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn error_from(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }

    /// Parse a successful response, or turn a failed one into an error with its body.
    /// An empty success body (204) parses as JSON `null`.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let bytes = response.bytes().await?;
        let parsed = if bytes.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        };
        parsed.map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {e}")))
    }

    // ===== Convenience Wrappers =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, (), ()>(Method::GET, path, None, None)
            .await
    }

    pub async fn get_with_params<T, Q>(&self, path: &str, params: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request::<T, (), Q>(Method::GET, path, None, Some(params))
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request::<T, B, ()>(Method::POST, path, Some(body), None)
            .await
    }
}
