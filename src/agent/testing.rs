//! Test doubles for the agent loop.

use super::{LanguageModel, MemoryEntry, ModelReply};
use crate::config::MeetingSettings;
use crate::credentials::{CredentialProvider, CredentialRecord};
use crate::error::{CloserError, Result};
use crate::tools::{EmailSender, MeetingScheduler, ProductCatalog, ToolContext, ToolDescriptor};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Replays a fixed list of model replies and records what it was shown.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelReply>>>,
    seen: Arc<Mutex<Vec<Vec<MemoryEntry>>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ModelReply>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Arc::default(),
        }
    }

    /// History snapshots, one per model call.
    pub fn seen(&self) -> Arc<Mutex<Vec<Vec<MemoryEntry>>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn next_step(
        &self,
        _system: &str,
        history: &[MemoryEntry],
        _tools: &[ToolDescriptor],
    ) -> Result<ModelReply> {
        self.seen.lock().unwrap().push(history.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CloserError::Agent("script exhausted".to_string())))
    }
}

/// Model that blocks inside its first call until released, to hold a
/// session in Busy.
pub struct GatedModel {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedModel {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for GatedModel {
    async fn next_step(
        &self,
        _system: &str,
        _history: &[MemoryEntry],
        _tools: &[ToolDescriptor],
    ) -> Result<ModelReply> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ModelReply::Final("done".to_string()))
    }
}

/// Credentials that are never available.
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn obtain(&self) -> Result<CredentialRecord> {
        Err(CloserError::Authorization("offline test".to_string()))
    }
}

/// Tools that never touch the network.
pub fn offline_tools() -> ToolContext {
    let credentials: Arc<dyn CredentialProvider> = Arc::new(NoCredentials);
    ToolContext::new(
        EmailSender::new(credentials.clone(), "http://127.0.0.1:1"),
        MeetingScheduler::new(credentials, "http://127.0.0.1:1", "primary", MeetingSettings::default()),
        ProductCatalog::builtin(),
    )
}
