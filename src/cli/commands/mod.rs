//! CLI command implementations.

mod ask;
mod auth;
mod chat;
mod config;
mod doctor;
mod products;
mod serve;

pub use ask::run_ask;
pub use auth::run_auth;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use products::run_products;
pub use serve::{router, run_serve, AppState};

use crate::agent::{Agent, OpenAIModel};
use crate::config::{Prompts, Settings};
use crate::credentials::CredentialProvider;
use crate::error::Result;
use crate::tools::ToolContext;
use std::sync::Arc;

/// Build a sales agent from settings around a shared credential provider.
pub(crate) fn sales_agent(
    settings: &Settings,
    model: Option<&str>,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<Agent<OpenAIModel>> {
    let mut llm = OpenAIModel::from_settings(settings)?;
    if let Some(model) = model {
        llm = llm.with_model(model);
    }

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let system = prompts.agent_system(settings.agent.system_prompt.as_deref());

    Ok(Agent::new(llm, ToolContext::from_settings(settings, credentials), &system)
        .with_max_iterations(settings.agent.max_iterations)
        .with_max_history(settings.agent.max_history_messages))
}
