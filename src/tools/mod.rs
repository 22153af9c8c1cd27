//! Tool definitions and dispatch for the sales agent.
//!
//! Every tool reports back with a [`ToolOutcome`]. Failures are described
//! in the message instead of being raised, so the agent loop always has a
//! natural-language result to hand to the model.

mod calendar;
mod email;
mod product;

pub use calendar::{parse_iso_datetime, CalendarEvent, MeetingScheduler, MeetingWindow};
pub use email::{build_mime_message, encode_raw_message, recipient_addresses, EmailSender};
pub use product::{ProductCatalog, ProductRecord};

use crate::config::Settings;
use crate::credentials::CredentialProvider;
use crate::error::{CloserError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a tool invocation as seen by the agent loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    /// Whether the requested action happened.
    pub ok: bool,
    /// Human-readable outcome, passed to the model verbatim.
    pub message: String,
}

impl ToolOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Name, description and JSON-schema arguments of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Send a plain-text email.
    SendEmail {
        email_content: String,
        recipient: String,
        subject: String,
    },

    /// Book a calendar meeting with a customer.
    ScheduleMeeting {
        customer_email: String,
        date: String,
        duration: Option<i64>,
    },

    /// Look up a product in the catalog.
    GetProductInfo { product_id: String },
}

impl ToolCall {
    /// Registered name of the tool this call targets.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SendEmail { .. } => "send_email",
            ToolCall::ScheduleMeeting { .. } => "schedule_meeting",
            ToolCall::GetProductInfo { .. } => "get_product_info",
        }
    }
}

/// Tool execution context holding the three tool implementations.
pub struct ToolContext {
    pub mailer: EmailSender,
    pub scheduler: MeetingScheduler,
    pub catalog: ProductCatalog,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(mailer: EmailSender, scheduler: MeetingScheduler, catalog: ProductCatalog) -> Self {
        Self {
            mailer,
            scheduler,
            catalog,
        }
    }

    /// Wire all tools from settings around a shared credential provider.
    pub fn from_settings(settings: &Settings, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(
            EmailSender::new(credentials.clone(), &settings.google.gmail_api_base),
            MeetingScheduler::new(
                credentials,
                &settings.google.calendar_api_base,
                &settings.google.calendar_id,
                settings.meetings.clone(),
            ),
            ProductCatalog::from_settings(settings),
        )
    }

    /// Execute a tool call. Never fails: problems come back as a failure outcome.
    pub async fn execute(&self, tool: &ToolCall) -> ToolOutcome {
        match tool {
            ToolCall::SendEmail {
                email_content,
                recipient,
                subject,
            } => self.mailer.send(email_content, recipient, subject).await,
            ToolCall::ScheduleMeeting {
                customer_email,
                date,
                duration,
            } => self.scheduler.schedule(customer_email, date, *duration).await,
            ToolCall::GetProductInfo { product_id } => self.catalog.lookup(product_id),
        }
    }
}

/// Descriptors for every registered tool, in registration order.
pub fn tool_definitions() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "send_email".to_string(),
            description: "Useful for sending emails to customers. \
                Provide the full email body, the recipient address and a subject line."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "email_content": {
                        "type": "string",
                        "description": "Plain-text body of the email"
                    },
                    "recipient": {
                        "type": "string",
                        "description": "Recipient address, or a comma-separated list (display names allowed)"
                    },
                    "subject": {
                        "type": "string",
                        "description": "Subject line"
                    }
                },
                "required": ["email_content", "recipient", "subject"]
            }),
        },
        ToolDescriptor {
            name: "schedule_meeting".to_string(),
            description: "Useful for scheduling meetings with customers. \
                Requires date in ISO format (YYYY-MM-DDTHH:MM:SS)"
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_email": {
                        "type": "string",
                        "description": "Email address of the customer to invite"
                    },
                    "date": {
                        "type": "string",
                        "description": "Meeting start in ISO format (YYYY-MM-DDTHH:MM:SS), UTC"
                    },
                    "duration": {
                        "type": "integer",
                        "description": "Length of the meeting in minutes (default: 60)",
                        "default": 60
                    }
                },
                "required": ["customer_email", "date"]
            }),
        },
        ToolDescriptor {
            name: "get_product_info".to_string(),
            description: "Useful for getting product information: price, features and availability."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "string",
                        "description": "Product identifier, e.g. product_xyz"
                    }
                },
                "required": ["product_id"]
            }),
        },
    ]
}

/// Parse a tool call from the model's function name and JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| CloserError::Agent(format!("Invalid tool arguments: {}", e)))?;

    match name {
        "send_email" => Ok(ToolCall::SendEmail {
            email_content: required_str(&args, "email_content")?,
            recipient: required_str(&args, "recipient")?,
            subject: required_str(&args, "subject")?,
        }),
        "schedule_meeting" => Ok(ToolCall::ScheduleMeeting {
            customer_email: required_str(&args, "customer_email")?,
            date: required_str(&args, "date")?,
            duration: optional_int(&args, "duration")?,
        }),
        "get_product_info" => Ok(ToolCall::GetProductInfo {
            product_id: required_str(&args, "product_id")?,
        }),
        _ => Err(CloserError::Agent(format!("Unknown tool: {}", name))),
    }
}

fn required_str(args: &serde_json::Value, key: &str) -> Result<String> {
    args[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CloserError::Agent(format!("Missing '{}' argument", key)))
}

/// Models sometimes send numbers as strings; accept both.
fn optional_int(args: &serde_json::Value, key: &str) -> Result<Option<i64>> {
    match &args[key] {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| CloserError::Agent(format!("'{}' must be a whole number", key))),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CloserError::Agent(format!("'{}' must be a whole number", key))),
        _ => Err(CloserError::Agent(format!("'{}' must be a whole number", key))),
    }
}
