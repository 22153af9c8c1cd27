//! Interactive terminal chat.

use super::sales_agent;
use crate::agent::LanguageModel;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::{CredentialProvider, GoogleCredentials};
use crate::session::ChatSession;
use console::style;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Skip,
    Exit,
    Clear,
    History,
    Help,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Skip
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else if line.eq_ignore_ascii_case("clear") {
        Input::Clear
    } else if line.eq_ignore_ascii_case("history") {
        Input::History
    } else if line.eq_ignore_ascii_case("help") || line == "?" {
        Input::Help
    } else {
        Input::Message(line)
    }
}

const CAPABILITIES: &[&str] = &[
    "Scheduling meetings with clients",
    "Sending follow-up emails",
    "Providing product information",
];

const EXAMPLES: &[&str] = &[
    "Schedule a meeting with client@example.com for tomorrow at 2 PM",
    "Send a follow-up email to customer@example.com about our meeting",
    "What are the features and pricing of product XYZ?",
];

/// Capability list, example requests and the prompt commands.
fn help_text() -> String {
    let mut text = String::from("This AI Sales Assistant can help you with:\n");
    for capability in CAPABILITIES {
        text.push_str(&format!("  - {}\n", capability));
    }
    text.push_str("\nExample commands:\n");
    for (i, example) in EXAMPLES.iter().enumerate() {
        text.push_str(&format!("  {}. \"{}\"\n", i + 1, example));
    }
    text.push_str("\n'help' shows this, 'clear' resets, 'history' replays, 'exit' quits.");
    text
}

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'closer doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    for note in preflight::advisories(Operation::Converse, &settings) {
        Output::warning(&note);
    }

    let credentials: Arc<dyn CredentialProvider> = Arc::new(GoogleCredentials::new(&settings));
    let session = ChatSession::new(sales_agent(&settings, model.as_deref(), credentials)?);

    println!("\n{}", style("Closer Sales Assistant").bold().cyan());
    println!("{}\n", style(help_text()).dim());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        match classify(&line) {
            Input::Skip => continue,
            Input::Exit => {
                Output::info("Goodbye!");
                break;
            }
            Input::Clear => match session.reset() {
                Ok(()) => Output::info("Conversation cleared."),
                Err(e) => Output::warning(&e.to_string()),
            },
            Input::History => print_history(&session),
            Input::Help => println!("\n{}\n", help_text()),
            Input::Message(text) => {
                let spinner = Output::spinner("Thinking...");
                let result = session.send(text).await;
                spinner.finish_and_clear();

                match result {
                    Ok(reply) => {
                        for call in &reply.tool_calls {
                            Output::tool_call(call);
                        }
                        println!("\n{} {}\n", style("Closer:").cyan().bold(), reply.turn.text);
                    }
                    Err(e) => Output::error(&format!("Error: {}", e)),
                }
            }
        }
    }

    Ok(())
}

fn print_history<M: LanguageModel>(session: &ChatSession<M>) {
    let turns = session.turns();
    if turns.is_empty() {
        Output::info("No messages yet.");
        return;
    }
    println!();
    for turn in &turns {
        Output::turn(turn);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_commands() {
        assert_eq!(classify("   \n"), Input::Skip);
        assert_eq!(classify("exit\n"), Input::Exit);
        assert_eq!(classify("QUIT"), Input::Exit);
        assert_eq!(classify("Clear"), Input::Clear);
        assert_eq!(classify("history"), Input::History);
        assert_eq!(classify("HELP"), Input::Help);
        assert_eq!(classify("?"), Input::Help);
        assert_eq!(
            classify("  book a meeting tomorrow \n"),
            Input::Message("book a meeting tomorrow")
        );
        assert_eq!(classify("help me price product xyz"), Input::Message("help me price product xyz"));
    }

    #[test]
    fn test_help_lists_capabilities_and_examples() {
        let text = help_text();
        assert!(text.starts_with("This AI Sales Assistant can help you with:"));
        for line in CAPABILITIES.iter().chain(EXAMPLES) {
            assert!(text.contains(line), "missing {:?}", line);
        }
        assert!(text.contains("1. \"Schedule a meeting with client@example.com"));
        assert!(text.contains("'exit' quits"));
    }
}
