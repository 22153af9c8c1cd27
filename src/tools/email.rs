//! Email sending through the Gmail API.

use super::ToolOutcome;
use crate::credentials::CredentialProvider;
use crate::error::{CloserError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, instrument};

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@<>,;]+@[^\s@<>,;]+\.[^\s@<>,;]+$").expect("valid regex"))
}

/// Sends plain-text email as the authorized Google user.
pub struct EmailSender {
    credentials: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
    api_base: String,
}

impl EmailSender {
    pub fn new(credentials: Arc<dyn CredentialProvider>, api_base: &str) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Tool entry point.
    pub async fn send(&self, content: &str, recipient: &str, subject: &str) -> ToolOutcome {
        match self.try_send(content, recipient, subject).await {
            Ok(()) => ToolOutcome::success(format!("Email sent successfully to {}", recipient)),
            Err(e) => ToolOutcome::failure(format!("Failed to send email: {}", e)),
        }
    }

    #[instrument(skip(self, content), fields(recipient = %recipient))]
    async fn try_send(&self, content: &str, recipient: &str, subject: &str) -> Result<()> {
        let raw = encode_raw_message(&build_mime_message(recipient, subject, content)?);

        let credentials = self.credentials.obtain().await?;
        let url = format!("{}/users/me/messages/send", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&credentials.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| CloserError::ExternalService(format!("Gmail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloserError::ExternalService(format!(
                "Gmail API returned {}: {}",
                status, body
            )));
        }

        info!("Email sent");
        Ok(())
    }
}

/// Build an RFC 2822 text/plain message.
///
/// Header values may not contain line breaks. Non-ASCII subjects are
/// RFC 2047 encoded and non-ASCII bodies are base64 transfer-encoded.
pub fn build_mime_message(recipient: &str, subject: &str, body: &str) -> Result<String> {
    let recipient = recipient.trim();
    recipient_addresses(recipient)?;
    if subject.contains(['\r', '\n']) {
        return Err(CloserError::Validation(
            "subject must be a single line".to_string(),
        ));
    }

    let subject_header = if subject.is_ascii() {
        subject.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(subject.as_bytes()))
    };

    let mut message = String::new();
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!("To: {}\r\n", recipient));
    message.push_str(&format!("Subject: {}\r\n", subject_header));

    if body.is_ascii() {
        message.push_str("Content-Type: text/plain; charset=\"us-ascii\"\r\n");
        message.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
        message.push_str(&body.replace("\r\n", "\n").replace('\n', "\r\n"));
    } else {
        message.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
        message.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        let encoded = STANDARD.encode(body.as_bytes());
        let lines: Vec<&str> = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| std::str::from_utf8(c).unwrap_or_default())
            .collect();
        message.push_str(&lines.join("\r\n"));
    }

    Ok(message)
}

/// Bare addresses named by a `To:` header value.
///
/// Entries are comma separated and may be bare (`a@x.com`) or carry a
/// display name (`Jane Doe <jane@acme.com>`, `"Doe, Jane" <jane@acme.com>`).
pub fn recipient_addresses(header: &str) -> Result<Vec<String>> {
    if header.contains(['\r', '\n']) {
        return Err(CloserError::Validation(
            "recipient must be a single line".to_string(),
        ));
    }

    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in header.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    entries.push(current);
    if quoted {
        return Err(CloserError::Validation(format!(
            "unbalanced quote in recipient '{}'",
            header
        )));
    }

    let mut addresses = Vec::new();
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        let address = match (entry.rfind('<'), entry.ends_with('>')) {
            (Some(open), true) => entry[open + 1..entry.len() - 1].trim(),
            (None, false) => entry,
            _ => "",
        };
        if !address_pattern().is_match(address) {
            return Err(CloserError::Validation(format!(
                "invalid recipient address '{}'",
                entry
            )));
        }
        addresses.push(address.to_string());
    }

    if addresses.is_empty() {
        return Err(CloserError::Validation(
            "no recipient address given".to_string(),
        ));
    }
    Ok(addresses)
}

/// URL-safe base64 as the Gmail `raw` field expects.
pub fn encode_raw_message(message: &str) -> String {
    URL_SAFE.encode(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialRecord;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use std::sync::Mutex;

    struct StaticToken;

    #[async_trait::async_trait]
    impl CredentialProvider for StaticToken {
        async fn obtain(&self) -> Result<CredentialRecord> {
            Ok(CredentialRecord {
                access_token: "test-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                scopes: vec![],
                expires_at: None,
            })
        }
    }

    struct Denied;

    #[async_trait::async_trait]
    impl CredentialProvider for Denied {
        async fn obtain(&self) -> Result<CredentialRecord> {
            Err(CloserError::Authorization("consent denied: access_denied".to_string()))
        }
    }

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn gmail_server(status: u16) -> (String, Captured) {
        let captured: Captured = Arc::default();

        async fn send(
            State((captured, status)): State<(Captured, u16)>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> (axum::http::StatusCode, Json<serde_json::Value>) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            captured.lock().unwrap().push((auth, body));
            (
                axum::http::StatusCode::from_u16(status).unwrap(),
                Json(serde_json::json!({ "id": "msg-1" })),
            )
        }

        let app = Router::new()
            .route("/users/me/messages/send", post(send))
            .with_state((captured.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    #[test]
    fn test_mime_message_headers() {
        let msg = build_mime_message("client@example.com", "Follow-up", "Hi\nthere").unwrap();
        assert!(msg.contains("To: client@example.com\r\n"));
        assert!(msg.contains("Subject: Follow-up\r\n"));
        assert!(msg.ends_with("\r\n\r\nHi\r\nthere"));
    }

    #[test]
    fn test_mime_message_non_ascii() {
        let msg = build_mime_message("a@b.io", "Tilbud på møte", "Hei på deg").unwrap();
        assert!(msg.contains("Subject: =?utf-8?b?"));
        assert!(msg.contains("Content-Transfer-Encoding: base64"));
        assert!(!msg.contains("møte"));
    }

    #[test]
    fn test_header_injection_rejected() {
        assert!(build_mime_message("a@b.com\r\nBcc: x@y.com", "s", "b").is_err());
        assert!(build_mime_message("a@b.com", "s\r\nBcc: x@y.com", "b").is_err());
        assert!(build_mime_message("not-an-address", "s", "b").is_err());
    }

    #[test]
    fn test_display_names_and_lists_accepted() {
        assert_eq!(
            recipient_addresses("Jane Doe <jane@acme.com>").unwrap(),
            vec!["jane@acme.com"]
        );
        assert_eq!(
            recipient_addresses("a@x.com, b@y.com").unwrap(),
            vec!["a@x.com", "b@y.com"]
        );
        assert_eq!(
            recipient_addresses("\"Doe, Jane\" <jane@acme.com>, <ops@acme.com>").unwrap(),
            vec!["jane@acme.com", "ops@acme.com"]
        );

        let msg = build_mime_message("Jane Doe <jane@acme.com>", "Hi", "b").unwrap();
        assert!(msg.contains("To: Jane Doe <jane@acme.com>\r\n"));
        let msg = build_mime_message("a@x.com, b@y.com", "Hi", "b").unwrap();
        assert!(msg.contains("To: a@x.com, b@y.com\r\n"));
    }

    #[test]
    fn test_malformed_recipient_lists_rejected() {
        assert!(recipient_addresses("").is_err());
        assert!(recipient_addresses(" , ").is_err());
        assert!(recipient_addresses("a@x.com, nobody").is_err());
        assert!(recipient_addresses("Jane <jane@acme.com").is_err());
        assert!(recipient_addresses("\"Doe, Jane <jane@acme.com>").is_err());
        assert!(recipient_addresses("Jane Doe <jane@acme.com>\r\nBcc: x@y.com").is_err());
    }

    #[test]
    fn test_raw_encoding_is_url_safe() {
        let raw = encode_raw_message("Subject: ??>>\r\n\r\n~~~");
        assert!(!raw.contains('+') && !raw.contains('/'));
        let decoded = URL_SAFE.decode(raw).unwrap();
        assert_eq!(decoded, b"Subject: ??>>\r\n\r\n~~~");
    }

    #[tokio::test]
    async fn test_send_success() {
        let (base, captured) = gmail_server(200).await;
        let sender = EmailSender::new(Arc::new(StaticToken), &base);

        let outcome = sender.send("Thanks for your time", "client@example.com", "Follow-up").await;
        assert!(outcome.ok);
        assert_eq!(outcome.message, "Email sent successfully to client@example.com");

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Bearer test-token");
        let raw = calls[0].1["raw"].as_str().unwrap();
        let decoded = String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap();
        assert!(decoded.contains("To: client@example.com"));
        assert!(decoded.contains("Thanks for your time"));
    }

    #[tokio::test]
    async fn test_api_rejection_becomes_failure_text() {
        let (base, _) = gmail_server(403).await;
        let sender = EmailSender::new(Arc::new(StaticToken), &base);

        let outcome = sender.send("body", "client@example.com", "s").await;
        assert!(!outcome.ok);
        assert!(outcome.message.starts_with("Failed"));
        assert!(outcome.message.contains("403"));
    }

    #[tokio::test]
    async fn test_authorization_failure_becomes_failure_text() {
        let sender = EmailSender::new(Arc::new(Denied), "http://127.0.0.1:1");
        let outcome = sender.send("body", "client@example.com", "s").await;
        assert!(!outcome.ok);
        assert!(outcome.message.starts_with("Failed to send email"));
        assert!(outcome.message.contains("access_denied"));
    }

    #[tokio::test]
    async fn test_network_failure_becomes_failure_text() {
        let sender = EmailSender::new(Arc::new(StaticToken), "http://127.0.0.1:1");
        let outcome = sender.send("body", "client@example.com", "s").await;
        assert!(!outcome.ok);
        assert!(outcome.message.starts_with("Failed"));
    }
}
