//! Closer - a conversational sales assistant
//!
//! An LLM agent that answers product questions, emails customers through
//! Gmail and books meetings on Google Calendar, one chat session at a time.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `credentials` - Google OAuth2 token loading, refresh and consent
//! - `tools` - Email sender, meeting scheduler and product catalog
//! - `agent` - Tool-calling loop over a pluggable language model
//! - `session` - Per-conversation turns, busy state and reset
//! - `cli` - Terminal chat, one-shot ask and the HTTP chat API
//!
//! # Example
//!
//! ```rust,no_run
//! use closer::agent::{Agent, OpenAIModel};
//! use closer::config::{Prompts, Settings};
//! use closer::credentials::{CredentialProvider, GoogleCredentials};
//! use closer::session::ChatSession;
//! use closer::tools::ToolContext;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let credentials: Arc<dyn CredentialProvider> = Arc::new(GoogleCredentials::new(&settings));
//!     let system = Prompts::default().agent_system(None);
//!
//!     let agent = Agent::new(
//!         OpenAIModel::from_settings(&settings)?,
//!         ToolContext::from_settings(&settings, credentials),
//!         &system,
//!     );
//!     let session = ChatSession::new(agent);
//!
//!     let reply = session.send("What does product_xyz cost?").await?;
//!     println!("{}", reply.turn.text);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod openai;
pub mod session;
pub mod tools;

pub use error::{CloserError, Result};
