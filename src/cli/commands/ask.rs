//! Ask command implementation.

use super::sales_agent;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::{CredentialProvider, GoogleCredentials};
use crate::session::ChatSession;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command: one message through a fresh session.
pub async fn run_ask(message: &str, model: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'closer doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    for note in preflight::advisories(Operation::Converse, &settings) {
        Output::warning(&note);
    }

    let credentials: Arc<dyn CredentialProvider> = Arc::new(GoogleCredentials::new(&settings));
    let agent = sales_agent(&settings, model.as_deref(), credentials)?;
    let session = ChatSession::new(agent);

    let spinner = Output::spinner("Working...");

    match session.send(message).await {
        Ok(reply) => {
            spinner.finish_and_clear();

            println!("\n{}\n", reply.turn.text);

            if !reply.tool_calls.is_empty() {
                Output::header(&format!("Tool calls ({})", reply.tool_calls.len()));
                for call in &reply.tool_calls {
                    Output::tool_call(call);
                }
                println!();
            }

            Output::info(&format!("Completed in {} iteration(s)", reply.iterations));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Request failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
