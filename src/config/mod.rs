//! Configuration module for Closer.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    AgentSettings, CatalogSettings, GeneralSettings, GoogleSettings, MeetingSettings,
    OpenAISettings, PromptSettings, ServerSettings, Settings, API_KEY_ENV,
};
