//! Reqwest-based HTTP client for the Lifeline API.
//!
//! Every request carries the live credential as a bearer token. Failures
//! are normalized into [`LifelineError`] in this order:
//! 1. no response (offline, aborted, timeout) → `NetworkUnreachable`
//! 2. status 401 → the token store is cleared
//! 3. known backend wording is remapped to stable categories
//! 4. everything else keeps its status and server message

use crate::config::LifelineConfig;
use crate::errors::{DUPLICATE_USER_MESSAGE, INVALID_CREDENTIALS_MESSAGE};
use crate::protocol::models::{
    extract_error_message, parse_auth_response, parse_contact_list, parse_created_contact,
    AuthResponse, Contact, IdentityFacts, NewContact,
};
use crate::session::store::TokenStore;
use crate::LifelineError;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use std::sync::Arc;

/// HTTP response with captured status and body.
#[derive(Debug)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,

    /// Request path, for logging.
    pub path: String,
}

impl ApiResponse {
    async fn from_response(response: Response, path: String) -> Result<Self, LifelineError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| LifelineError::NetworkUnreachable(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(Self { status, body, path })
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Lifeline API client.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    user_agent: String,
    store: Arc<TokenStore>,
}

impl ApiClient {
    /// Create a new API client from config.
    pub fn new(config: &LifelineConfig, store: Arc<TokenStore>) -> Result<Self, LifelineError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LifelineError::ConfigError(format!("Invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LifelineError::ConfigError(format!(
                "base_url cannot be used as a base: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LifelineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            user_agent: build_user_agent(),
            store,
        })
    }

    /// `POST /auth/register`.
    pub async fn register(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        let response = self.send(Method::POST, &["auth", "register"], Some(facts)).await?;
        parse_auth_response(&response.body)
    }

    /// `POST /auth/login`.
    pub async fn login(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        let response = self.send(Method::POST, &["auth", "login"], Some(facts)).await?;
        parse_auth_response(&response.body)
    }

    /// `GET /contacts`.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, LifelineError> {
        let response = self.send::<()>(Method::GET, &["contacts"], None).await?;
        parse_contact_list(&response.body)
    }

    /// `POST /contacts`.
    pub async fn add_contact(&self, contact: &NewContact) -> Result<Contact, LifelineError> {
        let response = self.send(Method::POST, &["contacts"], Some(contact)).await?;
        parse_created_contact(&response.body, contact)
    }

    /// `DELETE /contacts/:id`.
    pub async fn delete_contact(&self, id: &str) -> Result<(), LifelineError> {
        if id.is_empty() {
            return Err(LifelineError::invalid_input("Contact id is required."));
        }
        self.send::<()>(Method::DELETE, &["contacts", id], None).await?;
        Ok(())
    }

    /// Send a request and normalize any failure.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<ApiResponse, LifelineError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json");

        if let Some(token) = self.store.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path = %path, "sending request");

        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let response = ApiResponse::from_response(response, path).await?;

        if response.is_success() {
            return Ok(response);
        }

        let error = classify_failure(response.status, &response.body);

        if response.status == 401 || matches!(error, LifelineError::AuthenticationRejected { .. }) {
            tracing::warn!(path = %response.path, status = response.status, "unauthorized, clearing session");
            self.store.clear();
        }

        Err(error)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, LifelineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LifelineError::ConfigError("base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Map a failed status and body to an error, remapping known wording.
///
/// Backend messages are matched case-insensitively so the UI never depends
/// on exact upstream text.
pub fn classify_failure(status: u16, body: &[u8]) -> LifelineError {
    let message = extract_error_message(body);

    if let Some(text) = message.as_deref().map(str::to_ascii_lowercase) {
        if text.starts_with("user does not exist") {
            tracing::debug!(status, "remapping missing user to invalid credentials");
            return LifelineError::AuthenticationRejected {
                message: Some(INVALID_CREDENTIALS_MESSAGE.to_string()),
            };
        }
        if text.contains("already exists") || text.contains("duplicate") {
            tracing::debug!(status, "remapping to duplicate user");
            return LifelineError::DuplicateEntity {
                message: Some(DUPLICATE_USER_MESSAGE.to_string()),
            };
        }
    }

    LifelineError::from_status(status, message)
}

fn transport_error(e: &reqwest::Error) -> LifelineError {
    if e.is_builder() {
        return LifelineError::ConfigError(format!("Invalid request: {}", e));
    }
    if e.is_timeout() {
        return LifelineError::NetworkUnreachable("request timed out".to_string());
    }
    LifelineError::NetworkUnreachable(format!("Request failed: {}", e))
}

/// Build a User-Agent string.
///
/// Format: `lifeline/<version>`
pub fn build_user_agent() -> String {
    format!("lifeline/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::protocol::models::UserProfile;
    use crate::storage::MemoryStore;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store() -> Arc<TokenStore> {
        Arc::new(TokenStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Duration::from_secs(3600),
        ))
    }

    fn signed_in_store() -> Arc<TokenStore> {
        let store = store();
        store
            .establish(
                "tok-1",
                Some(600),
                &UserProfile {
                    id: Some("u1".into()),
                    full_name: "Test User".into(),
                    phone_number: "+11234567890".into(),
                },
            )
            .unwrap();
        store
    }

    fn client_for(server: &MockServer, store: Arc<TokenStore>) -> ApiClient {
        let config = LifelineConfig {
            base_url: format!("{}/api", server.uri()),
            request_timeout: Duration::from_millis(500),
            ..LifelineConfig::default()
        };
        ApiClient::new(&config, store).unwrap()
    }

    fn facts() -> IdentityFacts {
        IdentityFacts::new("Test User", "2000-01-01", "+11234567890")
    }

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent();
        assert_eq!(ua, format!("lifeline/{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_api_response_success_range() {
        let response = |status| ApiResponse {
            status,
            body: Vec::new(),
            path: "/api/contacts".to_string(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(401).is_success());
    }

    #[test]
    fn test_classify_remaps_backend_wording() {
        let err = classify_failure(400, br#"{"message":"User does not exists"}"#);
        assert_eq!(
            err,
            LifelineError::AuthenticationRejected {
                message: Some(INVALID_CREDENTIALS_MESSAGE.to_string())
            }
        );

        for body in [
            br#"{"message":"User already exists"}"#.as_slice(),
            br#"{"message":"E11000 duplicate key"}"#.as_slice(),
        ] {
            let err = classify_failure(500, body);
            assert_eq!(err.status(), Some(409));
            assert_eq!(err.user_message(), DUPLICATE_USER_MESSAGE);
        }
    }

    #[test]
    fn test_classify_passes_through_other_failures() {
        let err = classify_failure(404, br#"{"message":"Contact not found."}"#);
        assert_eq!(
            err,
            LifelineError::NotFound {
                message: Some("Contact not found.".to_string())
            }
        );

        let err = classify_failure(502, b"Bad Gateway");
        assert_eq!(err, LifelineError::ServerFault { status: 502, message: None });
    }

    #[test]
    fn test_client_rejects_opaque_base_url() {
        let config = LifelineConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..LifelineConfig::default()
        };
        assert!(matches!(
            ApiClient::new(&config, store()),
            Err(LifelineError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_bearer_attached_when_live() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contacts"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "c1", "name": "Mom", "phoneNumber": "+15550001111"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, signed_in_store());
        let contacts = client.list_contacts().await.unwrap();
        assert_eq!(contacts.len(), 1);
    }

    #[tokio::test]
    async fn test_no_bearer_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(serde_json::json!({
                "fullName": "Test User",
                "dateOfBirth": "2000-01-01",
                "phoneNumber": "+11234567890"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "fresh", "expiresIn": 60
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, store());
        let response = client.login(&facts()).await.unwrap();
        assert_eq!(response.token, "fresh");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_401_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contacts"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "Token expired"
            })))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let client = client_for(&server, store.clone());
        let err = client.list_contacts().await.unwrap_err();

        assert!(matches!(err, LifelineError::AuthenticationRejected { .. }));
        assert_eq!(err.user_message(), "Token expired");
        assert!(store.read().is_none());
        assert!(store.profile().is_none());
    }

    #[tokio::test]
    async fn test_remapped_missing_user_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "User does not exists"
            })))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let client = client_for(&server, store.clone());
        let err = client.login(&facts()).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn test_server_fault_keeps_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contacts"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "message": "maintenance"
            })))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let client = client_for(&server, store.clone());
        let err = client
            .add_contact(&NewContact::new("Mom", "+15550001111"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LifelineError::ServerFault {
                status: 503,
                message: Some("maintenance".to_string())
            }
        );
        assert!(store.session().is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_network_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contacts"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = client_for(&server, signed_in_store());
        let err = client.list_contacts().await.unwrap_err();
        assert!(matches!(err, LifelineError::NetworkUnreachable(_)));
        assert_eq!(err.status(), Some(0));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_unreachable() {
        let config = LifelineConfig {
            base_url: "http://127.0.0.1:1/api".to_string(),
            ..LifelineConfig::default()
        };
        let client = ApiClient::new(&config, store()).unwrap();
        let err = client.login(&facts()).await.unwrap_err();
        assert!(matches!(err, LifelineError::NetworkUnreachable(_)));
    }

    #[tokio::test]
    async fn test_auth_success_without_token_is_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "user": {"id": "u1", "fullName": "Test User", "phoneNumber": "+11234567890"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, store());
        let err = client.register(&facts()).await.unwrap_err();
        assert!(matches!(err, LifelineError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_delete_contact_encodes_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/contacts/a%20b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Contact deleted successfully"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, signed_in_store());
        client.delete_contact("a b").await.unwrap();
        assert!(client.delete_contact("").await.is_err());
    }
}
