//! File-backed Google credential provider.

use super::flow::{exchange_code, refresh_token, run_loopback_consent};
use super::{ClientSecrets, CredentialProvider, CredentialRecord, TokenStore};
use crate::config::Settings;
use crate::error::{CloserError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Credential provider shared by every session in the process.
///
/// The mutex serialises load/refresh/consent so concurrent sessions never
/// race on the token file from inside one process.
pub struct GoogleCredentials {
    store: TokenStore,
    secrets_path: PathBuf,
    auth_uri: String,
    token_uri: String,
    scopes: Vec<String>,
    interactive: bool,
    http: reqwest::Client,
    cached: Mutex<Option<CredentialRecord>>,
}

impl GoogleCredentials {
    /// Create a provider from settings. Interactive consent is allowed.
    pub fn new(settings: &Settings) -> Self {
        Self {
            store: TokenStore::new(settings.token_path()),
            secrets_path: settings.client_secrets_path(),
            auth_uri: settings.google.auth_uri.clone(),
            token_uri: settings.google.token_uri.clone(),
            scopes: settings.google.scopes.clone(),
            interactive: true,
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Allow or forbid the browser consent flow.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Path of the persisted token record.
    pub fn token_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Peek at the persisted record without refreshing or prompting.
    pub fn stored(&self) -> Result<Option<CredentialRecord>> {
        self.store.load()
    }

    fn load_secrets(&self) -> Result<ClientSecrets> {
        ClientSecrets::load(&self.secrets_path)
    }

    async fn refresh(&self, previous: &CredentialRecord) -> Result<CredentialRecord> {
        let refresh = previous
            .refresh_token
            .as_deref()
            .ok_or_else(|| CloserError::Authorization("no refresh token stored".to_string()))?;

        let secrets = self.load_secrets()?;
        let token_uri = secrets.token_uri.clone().unwrap_or_else(|| self.token_uri.clone());
        let response = refresh_token(&self.http, &token_uri, &secrets, refresh).await?;

        Ok(CredentialRecord::from_response(
            response,
            previous.refresh_token.clone(),
            &self.scopes,
            Utc::now(),
        ))
    }

    async fn authorize(&self) -> Result<CredentialRecord> {
        if !self.interactive {
            return Err(CloserError::Authorization(
                "no valid Google credentials and interactive authorization is disabled. Run 'closer auth' first."
                    .to_string(),
            ));
        }

        let secrets = self.load_secrets()?;
        let auth_uri = secrets.auth_uri.clone().unwrap_or_else(|| self.auth_uri.clone());
        let token_uri = secrets.token_uri.clone().unwrap_or_else(|| self.token_uri.clone());

        let (code, redirect_uri) = run_loopback_consent(&secrets, &auth_uri, &self.scopes).await?;
        let response = exchange_code(&self.http, &token_uri, &secrets, &code, &redirect_uri).await?;

        Ok(CredentialRecord::from_response(response, None, &self.scopes, Utc::now()))
    }
}

#[async_trait]
impl CredentialProvider for GoogleCredentials {
    async fn obtain(&self) -> Result<CredentialRecord> {
        let mut cached = self.cached.lock().await;

        if let Some(record) = cached.as_ref().filter(|r| r.is_valid()) {
            return Ok(record.clone());
        }

        let stored = self.store.load()?.filter(|r| r.covers(&self.scopes));
        if let Some(record) = stored.as_ref().filter(|r| r.is_valid()) {
            debug!("Using stored Google credentials");
            *cached = Some(record.clone());
            return Ok(record.clone());
        }

        let refreshed = match stored.as_ref() {
            Some(previous) if previous.refresh_token.is_some() => match self.refresh(previous).await {
                Ok(record) => {
                    info!("Refreshed Google access token");
                    Some(record)
                }
                Err(e) => {
                    warn!("Token refresh failed, falling back to consent: {}", e);
                    None
                }
            },
            _ => None,
        };

        let record = match refreshed {
            Some(record) => record,
            None => self.authorize().await?,
        };

        self.store.save(&record)?;
        *cached = Some(record.clone());
        Ok(record)
    }
}
