//! Credentials for the authorization service.
//!
//! Supports:
//! - no authentication (local OpenFGA)
//! - a pre-issued API token
//! - OAuth2 client credentials, exchanged at the token issuer and cached
//!   until shortly before expiry

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::core::config::FgaSettings;
use crate::core::errors::RagError;

// refresh this long before the issuer's expiry
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Clone)]
pub struct ClientCredentials {
    pub api_token_issuer: String,
    pub api_audience: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("api_token_issuer", &self.api_token_issuer)
            .field("api_audience", &self.api_audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"****")
            .finish()
    }
}

#[derive(Clone)]
pub enum Credentials {
    None,
    ApiToken(String),
    ClientCredentials(ClientCredentials),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::ApiToken(_) => f.write_str("ApiToken(****)"),
            Credentials::ClientCredentials(creds) => creds.fmt(f),
        }
    }
}

impl Credentials {
    /// Client credentials take precedence over a static token.
    pub fn from_settings(settings: &FgaSettings) -> Self {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        if let (Some(client_id), Some(client_secret)) =
            (non_empty(&settings.client_id), non_empty(&settings.client_secret))
        {
            return Credentials::ClientCredentials(ClientCredentials {
                api_token_issuer: settings.api_token_issuer.clone(),
                api_audience: settings.api_audience.clone(),
                client_id,
                client_secret,
            });
        }

        match non_empty(&settings.api_token) {
            Some(token) => Credentials::ApiToken(token),
            None => Credentials::None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Credentials::None)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

/// Resolves the bearer token to send with each request.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    credentials: Credentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, client: Client) -> Self {
        Self {
            credentials,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn bearer(&self) -> Result<Option<String>, RagError> {
        match &self.credentials {
            Credentials::None => Ok(None),
            Credentials::ApiToken(token) => Ok(Some(token.clone())),
            Credentials::ClientCredentials(creds) => self.client_credentials_token(creds).await.map(Some),
        }
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }

    async fn client_credentials_token(&self, creds: &ClientCredentials) -> Result<String, RagError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS) {
                    return Ok(cached.token.clone());
                }
            }
        }

        tracing::debug!("Requesting authorization service access token");
        let url = token_url(&creds.api_token_issuer);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "client_id": creds.client_id,
                "client_secret": creds.client_secret,
                "audience": creds.api_audience,
                "grant_type": "client_credentials",
            }))
            .send()
            .await
            .map_err(|e| RagError::Fga(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Fga(format!(
                "token request failed: HTTP {} - {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RagError::Fga(format!("invalid token response: {}", e)))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.access_token.clone(),
                expires_at,
            });
        }

        tracing::info!(
            expires_in = token.expires_in,
            token_type = token.token_type.as_deref().unwrap_or("Bearer"),
            "Obtained authorization service access token"
        );
        Ok(token.access_token)
    }
}

/// `auth.fga.dev` -> `https://auth.fga.dev/oauth/token`; an issuer that
/// already carries a path is used as given.
fn token_url(issuer: &str) -> String {
    let with_scheme = if issuer.starts_with("http://") || issuer.starts_with("https://") {
        issuer.to_string()
    } else {
        format!("https://{}", issuer)
    };

    let after_scheme = with_scheme
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&with_scheme);
    let has_path = after_scheme
        .split_once('/')
        .is_some_and(|(_, path)| !path.is_empty());

    if has_path {
        with_scheme
    } else {
        format!("{}/oauth/token", with_scheme.trim_end_matches('/'))
    }
}
