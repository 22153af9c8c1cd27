//! CLI module for Closer.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Closer - a conversational sales assistant
///
/// Chat with an agent that can look up products, send emails through Gmail
/// and book meetings on Google Calendar.
#[derive(Parser, Debug)]
#[command(name = "closer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a single message and print the reply
    Ask {
        /// The message for the sales agent
        message: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start the HTTP chat API
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Authorize Google access for email and calendar
    Auth {
        /// Only report the stored token, never open a browser
        #[arg(long)]
        status: bool,
    },

    /// List the product catalog
    Products,

    /// Check configuration and credentials
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

/// Tracing filter for this run. `-v` flags win over the configured
/// `general.log_level`; a configured value containing `=` is used verbatim
/// as a filter directive.
pub fn log_filter(verbose: u8, configured: &str) -> String {
    let level = match verbose {
        0 => configured.trim(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    match level {
        "" => "closer=warn".to_string(),
        directive if directive.contains('=') => directive.to_string(),
        level => format!("closer={}", level),
    }
}
