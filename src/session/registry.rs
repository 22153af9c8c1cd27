//! Live sessions keyed by id, for the HTTP surface.

use super::ChatSession;
use crate::agent::{Agent, LanguageModel};
use crate::error::{CloserError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Builds a fresh agent for each new session.
pub type AgentFactory<M> = Box<dyn Fn() -> Result<Agent<M>> + Send + Sync>;

pub struct SessionRegistry<M> {
    sessions: RwLock<HashMap<Uuid, Arc<ChatSession<M>>>>,
    factory: AgentFactory<M>,
}

impl<M: LanguageModel> SessionRegistry<M> {
    pub fn new(factory: AgentFactory<M>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Start a new, empty session.
    pub async fn create(&self) -> Result<Arc<ChatSession<M>>> {
        let session = Arc::new(ChatSession::new((self.factory)()?));
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        info!(session = %session.id(), "Session created");
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<ChatSession<M>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CloserError::SessionNotFound(id.to_string()))
    }

    /// Tear a session down. A message still in flight finishes on its own
    /// handle; the session just stops being reachable.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| info!(session = %id, "Session closed"))
            .ok_or_else(|| CloserError::SessionNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
