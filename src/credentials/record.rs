//! OAuth token material and client secrets.

use crate::error::{CloserError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Records expiring within this window are treated as already expired.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Authorized OAuth2 credentials for the Google APIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialRecord {
    /// Bearer token sent with API calls.
    #[serde(alias = "token")]
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Scopes granted with this token.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token stops working. `None` means unknown.
    #[serde(default, alias = "expiry", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    /// Whether the access token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) > now,
            None => true,
        }
    }

    /// Whether the access token can be used right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether every scope in `required` was granted.
    pub fn covers(&self, required: &[String]) -> bool {
        self.scopes.is_empty() || required.iter().all(|s| self.scopes.contains(s))
    }

    /// Build a record from a token endpoint response.
    ///
    /// Refresh responses usually omit the refresh token, so the previous one
    /// is carried over.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let scopes = match response.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(String::from).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scopes,
            expires_at: response.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

/// Successful reply from the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// OAuth client registration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Google wraps the registration in an "installed" or "web" object.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client secrets document.
    pub fn parse(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)?;
        file.installed.or(file.web).ok_or_else(|| {
            CloserError::Authorization(
                "client secrets file has neither an 'installed' nor a 'web' section".to_string(),
            )
        })
    }

    /// Read client secrets from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CloserError::Authorization(format!(
                "client secrets not found at {}. Download an OAuth client (Desktop app) from the Google Cloud console.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}
