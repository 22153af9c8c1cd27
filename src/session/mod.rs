//! Chat sessions: the turn list, the busy flag and the agent behind them.
//!
//! Every session is an explicit context object. It owns its turns and its
//! agent (and therefore the agent's memory); nothing is shared between
//! sessions except the process-wide credential provider inside the tools.

mod registry;

pub use registry::{AgentFactory, SessionRegistry};

use crate::agent::{Agent, LanguageModel, ToolCallRecord};
use crate::error::{CloserError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CANCELLED_REPLY: &str = "The request was cancelled before a reply was ready.";

/// Who wrote a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the visible conversation. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Whether a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Busy,
}

/// Append-only turn list plus the Idle/Busy state machine.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<Turn>,
    state: SessionState,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            turns: Vec::new(),
            state: SessionState::Idle,
        }
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Idle -> Busy, recording the user's turn.
    pub fn begin(&mut self, text: &str) -> Result<()> {
        if self.state == SessionState::Busy {
            return Err(CloserError::SessionBusy);
        }
        self.turns.push(Turn::new(Role::User, text));
        self.state = SessionState::Busy;
        Ok(())
    }

    /// Busy -> Idle, recording the assistant's turn.
    pub fn finish(&mut self, reply: &str) -> Turn {
        let turn = Turn::new(Role::Assistant, reply);
        self.turns.push(turn.clone());
        self.state = SessionState::Idle;
        turn
    }

    /// Clear every turn. Refused while a request is in flight.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == SessionState::Busy {
            return Err(CloserError::SessionBusy);
        }
        self.turns.clear();
        Ok(())
    }
}

/// Outcome of one user message.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReply {
    pub turn: Turn,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
}

/// Per-session context handed to every handler.
pub struct ChatSession<M> {
    id: Uuid,
    created_at: DateTime<Utc>,
    transcript: Mutex<Transcript>,
    agent: tokio::sync::Mutex<Agent<M>>,
}

impl<M: LanguageModel> ChatSession<M> {
    pub fn new(agent: Agent<M>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            transcript: Mutex::new(Transcript::new()),
            agent: tokio::sync::Mutex::new(agent),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.transcript().state()
    }

    /// Snapshot of the turns so far.
    pub fn turns(&self) -> Vec<Turn> {
        self.transcript().turns().to_vec()
    }

    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send a user message and wait for the assistant's reply.
    ///
    /// Rejected with [`CloserError::SessionBusy`] while another message is
    /// being answered. When the agent fails the session still returns to
    /// Idle, with an assistant turn describing the failure.
    pub async fn send(&self, text: &str) -> Result<SessionReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CloserError::Validation("message is empty".to_string()));
        }

        self.transcript().begin(text)?;
        debug!(session = %self.id, "Session busy");
        let mut busy = BusyGuard {
            session: self,
            armed: true,
        };

        // The agent guard is dropped at the end of this statement, before
        // going Idle, so a reset that observes Idle can always take it.
        let result = self.agent.lock().await.respond(text).await;
        busy.armed = false;

        let mut transcript = self.transcript();
        match result {
            Ok(response) => {
                let turn = transcript.finish(&response.content);
                info!(
                    session = %self.id,
                    tool_calls = response.tool_calls.len(),
                    "Reply ready"
                );
                Ok(SessionReply {
                    turn,
                    tool_calls: response.tool_calls,
                    iterations: response.iterations,
                })
            }
            Err(e) => {
                transcript.finish(&format!("Sorry, I couldn't complete that request: {}", e));
                Err(e)
            }
        }
    }

    /// Clear the turns and the agent's memory together.
    ///
    /// Refused while Busy so the visible conversation and the agent's memory
    /// can never drift apart. Resetting an empty session is a no-op.
    pub fn reset(&self) -> Result<()> {
        let mut transcript = self.transcript();
        if transcript.state() == SessionState::Busy {
            return Err(CloserError::SessionBusy);
        }
        let mut agent = self
            .agent
            .try_lock()
            .map_err(|_| CloserError::SessionBusy)?;

        transcript.reset()?;
        agent.clear_memory();
        info!(session = %self.id, "Session reset");
        Ok(())
    }

    /// Number of entries in the agent's memory.
    pub async fn memory_len(&self) -> usize {
        self.agent.lock().await.memory().len()
    }
}

/// Returns the session to Idle if a `send` future is dropped mid-flight.
struct BusyGuard<'a, M: LanguageModel> {
    session: &'a ChatSession<M>,
    armed: bool,
}

impl<M: LanguageModel> Drop for BusyGuard<'_, M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(session = %self.session.id, "Request cancelled before a reply was ready");
        self.session.transcript().finish(CANCELLED_REPLY);
        // Held only if the agent future outlives this guard; the agent then
        // discards the partial exchange on its next call.
        if let Ok(mut agent) = self.session.agent.try_lock() {
            agent.discard_interrupted();
        }
    }
}
