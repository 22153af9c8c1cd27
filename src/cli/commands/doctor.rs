//! Doctor command - verify configuration and credentials.

use crate::cli::output::mask_secret;
use crate::cli::Output;
use crate::config::{Settings, API_KEY_ENV};
use crate::credentials::{ClientSecrets, TokenStore};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Closer Doctor");
    println!();
    println!("Checking configuration and credentials...\n");

    let mut checks = Vec::new();

    let sections = [
        ("Language Model", vec![check_api_key(settings)]),
        (
            "Google Access",
            vec![
                check_client_secrets(&settings.client_secrets_path()),
                check_token(&settings.token_path(), &settings.google.scopes),
            ],
        ),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Closer.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Closer is ready to use.");
    }

    Ok(())
}

fn check_api_key(settings: &Settings) -> CheckResult {
    let source = if std::env::var(API_KEY_ENV).map(|k| !k.trim().is_empty()).unwrap_or(false) {
        "environment"
    } else {
        "config file"
    };

    match settings.api_key() {
        Ok(key) if key.starts_with("sk-") => CheckResult::ok(
            API_KEY_ENV,
            &format!("configured via {} ({})", source, mask_secret(&key)),
        ),
        Ok(_) => CheckResult::warning(
            API_KEY_ENV,
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            API_KEY_ENV,
            "not set",
            &format!("Set with: export {}='sk-...' or add it to .env", API_KEY_ENV),
        ),
    }
}

fn check_client_secrets(path: &Path) -> CheckResult {
    const NAME: &str = "Client secrets";
    const HINT: &str = "Download an OAuth client (Desktop app) JSON from the Google Cloud console";

    if !path.exists() {
        return CheckResult::error(NAME, &format!("{} not found", path.display()), HINT);
    }
    match ClientSecrets::load(path) {
        Ok(_) => CheckResult::ok(NAME, &path.display().to_string()),
        Err(e) => CheckResult::error(NAME, &format!("unreadable: {}", e), HINT),
    }
}

fn check_token(path: &Path, scopes: &[String]) -> CheckResult {
    const NAME: &str = "Token";

    match TokenStore::new(path).load() {
        Ok(Some(record)) if !record.covers(scopes) => CheckResult::warning(
            NAME,
            "stored token is missing required scopes",
            "Run 'closer auth' to authorize again",
        ),
        Ok(Some(record)) if record.is_valid() => {
            CheckResult::ok(NAME, &format!("valid ({})", path.display()))
        }
        Ok(Some(record)) if record.refresh_token.is_some() => {
            CheckResult::ok(NAME, "expired, will be refreshed on next use")
        }
        Ok(Some(_)) => CheckResult::warning(
            NAME,
            "expired and cannot be refreshed",
            "Run 'closer auth' to authorize again",
        ),
        Ok(None) => CheckResult::warning(
            NAME,
            "not authorized yet",
            "Run 'closer auth' (or let the first email/meeting request open the browser)",
        ),
        Err(e) => CheckResult::error(NAME, &format!("error: {}", e), "Check file permissions"),
    }
}

fn check_config_file(path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: closer config edit",
        )
    }
}
