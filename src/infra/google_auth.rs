//! Google OAuth access tokens for the Drive uploader.
//!
//! A service-account key is exchanged for a short-lived access token with a
//! signed RS256 JWT assertion; the token is cached until shortly before it
//! expires. A fixed bearer token is also accepted for local runs.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DriveSettings;
use crate::error::{AppError, Result};

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that token exchange needs.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// A service account that signs its own token requests.
pub struct ServiceAccount {
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    cached_token: Mutex<Option<CachedToken>>,
}

/// Where Drive access tokens come from.
pub enum TokenSource {
    Static(String),
    ServiceAccount(Box<ServiceAccount>),
}

impl TokenSource {
    /// Prefer the service-account key when configured, else a fixed token.
    pub fn from_settings(settings: &DriveSettings) -> Result<Self> {
        if let Some(path) = &settings.service_account_key {
            return Self::from_key_file(path);
        }
        settings
            .access_token
            .clone()
            .map(TokenSource::Static)
            .ok_or_else(|| {
                AppError::Config(
                    "neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_DRIVE_TOKEN is set".to_string(),
                )
            })
    }

    pub fn from_key_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "failed to read service account key '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_key_json(&content)
    }

    fn from_key_json(content: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(content)?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::Config(format!("invalid service account private key: {}", e)))?;

        info!(client_email = %key.client_email, "Using service account for Drive");
        Ok(TokenSource::ServiceAccount(Box::new(ServiceAccount {
            client_email: key.client_email,
            token_uri: key.token_uri,
            encoding_key,
            cached_token: Mutex::new(None),
        })))
    }

    /// A currently valid access token.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(account) => account.access_token(client).await,
        }
    }
}

impl ServiceAccount {
    async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let response = client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", self.assertion()?.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                message: format!("token exchange returned {}: {}", status, body),
            });
        }
        let granted: TokenResponse = response.json().await?;

        let lifetime = Duration::from_secs(granted.expires_in).saturating_sub(REFRESH_MARGIN);
        debug!(expires_in = granted.expires_in, "Refreshed Drive access token");
        *cached = Some(CachedToken {
            token: granted.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(granted.access_token)
    }

    fn assertion(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}
