//! Google OAuth2 credentials for the mail and calendar tools.
//!
//! A persisted token record is reused while valid, refreshed when it has
//! expired, and replaced through a browser consent flow when neither works.

mod flow;
mod google;
mod record;
mod store;

pub use flow::{classify_redirect, consent_url, Redirect};
pub use google::GoogleCredentials;
pub use record::{ClientSecrets, CredentialRecord, TokenResponse};
pub use store::TokenStore;

use crate::error::Result;
use async_trait::async_trait;

/// Source of bearer credentials for outbound Google API calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a currently valid credential record, refreshing or
    /// re-authorizing as needed.
    async fn obtain(&self) -> Result<CredentialRecord>;
}
