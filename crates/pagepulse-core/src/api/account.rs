//! Login, signup and site registration.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Credentials;
use crate::models::{CreatedSite, Site};

use super::{ApiClient, ApiError};

/// Message shown when the backend rejects a login without saying why
const DEFAULT_LOGIN_ERROR: &str = "Invalid username or password";

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Login response. Different backend versions have named the fields
/// differently, so every known spelling is accepted.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: Option<String>,
    token: Option<String>,
    access_token: Option<String>,
    refresh: Option<String>,
    refresh_token: Option<String>,
}

impl LoginResponse {
    fn into_credentials(self) -> Option<Credentials> {
        let access = self.access.or(self.token).or(self.access_token)?;
        Some(Credentials::new(access, self.refresh.or(self.refresh_token)))
    }
}

#[derive(Debug, Serialize)]
struct CreateSiteRequest<'a> {
    domain: &'a str,
}

/// Pull a human-readable message (`detail` or `error`) out of an error body.
fn backend_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::InvalidInput("Username is required".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::InvalidInput("Password is required".to_string()));
    }
    Ok(())
}

impl ApiClient {
    /// Log in and store the issued tokens
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials, ApiError> {
        validate_credentials(username, password)?;
        let username = username.trim();

        let response: LoginResponse = self
            .post_public("/login/", &AuthRequest { username, password })
            .await
            .map_err(|e| match e.status().map(|s| s.as_u16()) {
                Some(400 | 401) => ApiError::Unauthorized {
                    body: e
                        .body()
                        .and_then(backend_message)
                        .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string()),
                },
                _ => e,
            })?;

        let credentials = response
            .into_credentials()
            .ok_or_else(|| ApiError::InvalidResponse("No access token returned".to_string()))?;
        self.set_credentials(&credentials)?;

        info!(username, "Logged in");
        Ok(credentials)
    }

    /// Create an account, then log in with it
    pub async fn signup(&self, username: &str, password: &str) -> Result<Credentials, ApiError> {
        validate_credentials(username, password)?;

        let _: serde_json::Value = self
            .post_public(
                "/signup/",
                &AuthRequest {
                    username: username.trim(),
                    password,
                },
            )
            .await
            .map_err(|e| match (e.status(), e.body().and_then(backend_message)) {
                (Some(status), Some(message)) if status.is_client_error() => {
                    ApiError::InvalidInput(message)
                }
                _ => e,
            })?;

        info!(username = username.trim(), "Account created");
        self.login(username, password).await
    }

    /// Sites owned by the logged-in user
    pub async fn list_sites(&self) -> Result<Vec<Site>, ApiError> {
        self.get("/sites/").await
    }

    /// Register a new site for tracking
    pub async fn create_site(&self, domain: &str) -> Result<CreatedSite, ApiError> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(ApiError::InvalidInput("Site domain is required".to_string()));
        }

        let created: CreatedSite = self
            .post("/create-site/", &CreateSiteRequest { domain })
            .await?;
        info!(domain, site_id = %created.site_id, "Site registered");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::{MemoryTokenStore, TokenStore};

    fn client(server: &MockServer, store: Arc<MemoryTokenStore>) -> ApiClient {
        ApiClient::new(&server.uri(), store).unwrap()
    }

    #[test]
    fn test_login_response_aliases() {
        let canonical: LoginResponse =
            serde_json::from_str(r#"{"access": "a", "refresh": "r"}"#).unwrap();
        assert_eq!(
            canonical.into_credentials(),
            Some(Credentials::new("a", Some("r".to_string())))
        );

        let legacy: LoginResponse =
            serde_json::from_str(r#"{"access_token": "a", "refresh_token": "r"}"#).unwrap();
        assert_eq!(
            legacy.into_credentials(),
            Some(Credentials::new("a", Some("r".to_string())))
        );

        let token_only: LoginResponse = serde_json::from_str(r#"{"token": "a"}"#).unwrap();
        assert_eq!(token_only.into_credentials(), Some(Credentials::new("a", None)));

        let empty: LoginResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.into_credentials(), None);
    }

    #[test]
    fn test_backend_message() {
        assert_eq!(
            backend_message(r#"{"detail": "No active account found"}"#).as_deref(),
            Some("No active account found")
        );
        assert_eq!(
            backend_message(r#"{"error": "Username already taken"}"#).as_deref(),
            Some("Username already taken")
        );
        assert_eq!(backend_message(r#"{"detail": "  "}"#), None);
        assert_eq!(backend_message("plain text"), None);
    }

    #[tokio::test]
    async fn test_login_stores_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .and(body_json(json!({"username": "ana", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access": "a1", "refresh": "r1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let client = client(&server, store.clone());
        client.login(" ana ", "pw").await.unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_login_uses_backend_detail_and_never_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "No active account found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token/refresh/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials::new(
            "old",
            Some("refresh".to_string()),
        )));
        let client = client(&server, store.clone());
        let err = client.login("ana", "bad").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.body(), Some("No active account found"));
        // Existing session untouched
        assert_eq!(store.access_token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_rejected_login_without_detail_uses_default_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(ResponseTemplate::new(400).set_body_string(""))
            .mount(&server)
            .await;

        let client = client(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.login("ana", "bad").await.unwrap_err();
        assert_eq!(err.body(), Some(DEFAULT_LOGIN_ERROR));
    }

    #[tokio::test]
    async fn test_login_without_access_token_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"refresh": "r"})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let client = client(&server, store.clone());
        let err = client.login("ana", "pw").await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(store.credentials().is_none());
    }

    #[tokio::test]
    async fn test_login_validates_input_locally() {
        let client = ApiClient::new("http://127.0.0.1:1", Arc::new(MemoryTokenStore::new())).unwrap();
        assert!(matches!(
            client.login("  ", "pw").await,
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            client.login("ana", "").await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/signup/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "User created successfully"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a1"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let client = client(&server, store.clone());
        let creds = client.signup("ana", "pw").await.unwrap();
        assert_eq!(creds.access_token, "a1");
        assert_eq!(store.access_token().as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_signup_taken_username() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/signup/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Username already taken"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.signup("ana", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Username already taken");
    }

    #[tokio::test]
    async fn test_list_and_create_sites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "site_id": "s-1", "domain": "one.example"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/create-site/"))
            .and(body_json(json!({"domain": "two.example"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"site_id": "s-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials::new("a1", None)));
        let client = client(&server, store);

        let sites = client.list_sites().await.unwrap();
        assert_eq!(sites[0].site_id, "s-1");

        let created = client.create_site("  two.example ").await.unwrap();
        assert_eq!(created.site_id, "s-2");
    }

    #[tokio::test]
    async fn test_create_site_rejects_blank_domain() {
        let client = ApiClient::new("http://127.0.0.1:1", Arc::new(MemoryTokenStore::new())).unwrap();
        let err = client.create_site("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
