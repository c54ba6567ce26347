//! OAuth2 client-credentials tokens for the CDF API.

use crate::error::ConnectorError;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

const SERVICE: &str = "Identity provider";
/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Used when the identity provider omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("token_url", &self.token_url.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(access_token: String, expires_in: Option<u64>, now: Instant) -> Self {
        let lifetime = expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME)
            .saturating_sub(EXPIRY_MARGIN);
        CachedToken {
            access_token,
            refresh_at: now + lifetime,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Hands out bearer tokens, fetching a new one only when the cached token is
/// about to expire.
#[derive(Debug)]
pub struct TokenProvider {
    http: Client,
    credentials: ClientCredentials,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: Client, credentials: ClientCredentials) -> Self {
        Self {
            http,
            credentials,
            cached: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, ConnectorError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, ConnectorError> {
        debug!(token_url = %self.credentials.token_url, "Requesting CDF access token");
        let scope = self.credentials.scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(self.credentials.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(token_error(status, &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        info!(expires_in = ?parsed.expires_in, "Obtained CDF access token");
        Ok(CachedToken::new(
            parsed.access_token,
            parsed.expires_in,
            Instant::now(),
        ))
    }
}

fn token_error(status: StatusCode, body: &str) -> ConnectorError {
    let (code, message) = match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(err) => (
            Some(err.error),
            err.error_description.unwrap_or_default(),
        ),
        Err(_) => (None, body.to_string()),
    };
    ConnectorError::Api {
        service: SERVICE,
        status,
        code,
        message,
    }
}
