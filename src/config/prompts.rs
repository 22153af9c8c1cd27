//! Prompt templates for Closer.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the sales agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI sales agent assistant. Your goal is to help with sales-related tasks using the tools provided to you.

Guidelines:
- Use 'schedule_meeting' to book a meeting with a customer. Dates must be ISO format (YYYY-MM-DDTHH:MM:SS) in UTC. Today is {{today}}.
- Use 'send_email' to send follow-ups or other emails to customers.
- Use 'get_product_info' for product features, pricing and availability. Never invent product facts.
- If a tool reports a failure, tell the user what went wrong instead of claiming success.
- Ask for missing details (recipient, time, product) rather than guessing.
- Remember context from earlier in the conversation."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The agent system prompt, rendered with today's date.
    pub fn agent_system(&self, override_prompt: Option<&str>) -> String {
        let template = override_prompt.unwrap_or(&self.agent.system);
        let mut vars = HashMap::new();
        vars.insert(
            "today".to_string(),
            chrono::Utc::now().format("%Y-%m-%d").to_string(),
        );
        self.render_with_custom(template, &vars)
    }
}
