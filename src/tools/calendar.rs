//! Meeting scheduling through the Google Calendar API.

use super::ToolOutcome;
use crate::config::MeetingSettings;
use crate::credentials::CredentialProvider;
use crate::error::{CloserError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

const INVALID_DATE: &str = "Error: Invalid date format. Please use ISO format (YYYY-MM-DDTHH:MM:SS)";

/// Longest meeting accepted, one week.
const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;

/// Naive layouts accepted in addition to RFC 3339. Naive times are UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO 8601 timestamp the way a model is likely to write one.
pub fn parse_iso_datetime(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Start and end of a requested meeting.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_minutes: i64,
}

impl MeetingWindow {
    /// Validate the requested start and duration.
    pub fn parse(date: &str, duration_minutes: i64) -> Result<Self> {
        let start = parse_iso_datetime(date)
            .ok_or_else(|| CloserError::Validation(INVALID_DATE.to_string()))?;
        if !(1..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(CloserError::Validation(format!(
                "Error: Duration must be between 1 and {} minutes, got {}",
                MAX_DURATION_MINUTES, duration_minutes
            )));
        }
        let end = start
            .checked_add_signed(Duration::minutes(duration_minutes))
            .ok_or_else(|| CloserError::Validation("Error: Meeting ends out of range".to_string()))?;

        Ok(Self {
            start,
            end,
            duration_minutes,
        })
    }
}

/// Calendar insert payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub attendees: Vec<Attendee>,
    pub reminders: Reminders,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
}

impl CalendarEvent {
    /// One-attendee event with default reminders.
    pub fn new(window: &MeetingWindow, customer_email: &str, defaults: &MeetingSettings) -> Self {
        let time = |dt: &DateTime<FixedOffset>| EventTime {
            date_time: dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            time_zone: defaults.time_zone.clone(),
        };
        Self {
            summary: defaults.summary.clone(),
            description: defaults.description.clone(),
            start: time(&window.start),
            end: time(&window.end),
            attendees: vec![Attendee {
                email: customer_email.trim().to_string(),
            }],
            reminders: Reminders { use_default: true },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEvent {
    #[serde(default)]
    html_link: Option<String>,
}

/// Books meetings on the authorized user's calendar.
pub struct MeetingScheduler {
    credentials: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    defaults: MeetingSettings,
}

impl MeetingScheduler {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        api_base: &str,
        calendar_id: &str,
        defaults: MeetingSettings,
    ) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
            defaults,
        }
    }

    /// Tool entry point.
    pub async fn schedule(
        &self,
        customer_email: &str,
        date: &str,
        duration_minutes: Option<i64>,
    ) -> ToolOutcome {
        let duration = duration_minutes.unwrap_or(self.defaults.default_duration_minutes);
        let window = match MeetingWindow::parse(date, duration) {
            Ok(window) => window,
            Err(CloserError::Validation(msg)) => return ToolOutcome::failure(msg),
            Err(e) => return ToolOutcome::failure(format!("Error: {}", e)),
        };

        match self.insert(customer_email, &window).await {
            Ok(link) => ToolOutcome::success(format!(
                "Meeting scheduled successfully:\nWith: {}\nStart: {}\nDuration: {} minutes\nCalendar Link: {}",
                customer_email,
                window.start.format("%Y-%m-%d %H:%M"),
                window.duration_minutes,
                link
            )),
            Err(e) => ToolOutcome::failure(format!("Failed to schedule meeting: {}", e)),
        }
    }

    /// Events collection URL. Calendar ids may contain `#` and `@`, so the
    /// id is percent-encoded as a single path segment.
    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            CloserError::Config(format!("Invalid calendar_api_base '{}': {}", self.api_base, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                CloserError::Config(format!("calendar_api_base '{}' cannot take a path", self.api_base))
            })?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    #[instrument(skip(self, window), fields(attendee = %customer_email))]
    async fn insert(&self, customer_email: &str, window: &MeetingWindow) -> Result<String> {
        let credentials = self.credentials.obtain().await?;
        let event = CalendarEvent::new(window, customer_email, &self.defaults);
        let url = self.events_url()?;

        let response = self
            .http
            .post(url)
            .query(&[("sendUpdates", "all")])
            .bearer_auth(&credentials.access_token)
            .json(&event)
            .send()
            .await
            .map_err(|e| CloserError::ExternalService(format!("Calendar request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloserError::ExternalService(format!(
                "Calendar API returned {}: {}",
                status, body
            )));
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| CloserError::ExternalService(format!("Unreadable calendar response: {}", e)))?;

        info!("Meeting created");
        Ok(created
            .html_link
            .unwrap_or_else(|| "No link available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialRecord;
    use axum::{
        extract::{Path, Query, State},
        routing::post,
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingToken {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CredentialProvider for CountingToken {
        async fn obtain(&self) -> Result<CredentialRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CredentialRecord {
                access_token: "cal-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                scopes: vec![],
                expires_at: None,
            })
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl CredentialProvider for Failing {
        async fn obtain(&self) -> Result<CredentialRecord> {
            Err(CloserError::Authorization("no client secrets".to_string()))
        }
    }

    #[derive(Default, Clone)]
    struct Recorded {
        events: Arc<Mutex<Vec<(HashMap<String, String>, serde_json::Value)>>>,
        calendars: Arc<Mutex<Vec<String>>>,
    }

    async fn calendar_server(html_link: Option<&'static str>) -> (String, Recorded) {
        let recorded = Recorded::default();

        async fn insert(
            State((recorded, link)): State<(Recorded, Option<&'static str>)>,
            Path(calendar_id): Path<String>,
            Query(query): Query<HashMap<String, String>>,
            Json(body): Json<serde_json::Value>,
        ) -> Json<serde_json::Value> {
            recorded.calendars.lock().unwrap().push(calendar_id);
            recorded.events.lock().unwrap().push((query, body));
            match link {
                Some(link) => Json(serde_json::json!({ "id": "evt1", "htmlLink": link })),
                None => Json(serde_json::json!({ "id": "evt1" })),
            }
        }

        let app = Router::new()
            .route("/calendars/{calendar_id}/events", post(insert))
            .with_state((recorded.clone(), html_link));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), recorded)
    }

    fn scheduler(credentials: Arc<dyn CredentialProvider>, base: &str) -> MeetingScheduler {
        MeetingScheduler::new(credentials, base, "primary", MeetingSettings::default())
    }

    #[test]
    fn test_events_url_encodes_calendar_id() {
        let scheduler = MeetingScheduler::new(
            Arc::new(Failing),
            "https://www.googleapis.com/calendar/v3/",
            "en.usa#holiday@group.v.calendar.google.com",
            MeetingSettings::default(),
        );
        let url = scheduler.events_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.usa%23holiday@group.v.calendar.google.com/events"
        );
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_parse_iso_variants() {
        let utc = parse_iso_datetime("2025-03-01T14:00:00").unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-03-01T14:00:00+00:00");

        assert!(parse_iso_datetime("2025-03-01T14:00").is_some());
        assert!(parse_iso_datetime("2025-03-01 14:00:00").is_some());
        assert!(parse_iso_datetime("2025-03-01T14:00:00.250").is_some());
        assert!(parse_iso_datetime("2025-03-01T14:00:00Z").is_some());

        let offset = parse_iso_datetime("2025-03-01T14:00:00+02:00").unwrap();
        assert_eq!(offset.offset().local_minus_utc(), 7200);

        let midnight = parse_iso_datetime("2025-03-01").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2025-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_iso_rejects_garbage() {
        for bad in ["tomorrow at 2pm", "2025-13-01T10:00:00", "2025-02-30", "", "14:00", "03/01/2025 10:00"] {
            assert!(parse_iso_datetime(bad).is_none(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_window_end_is_start_plus_duration() {
        for minutes in [1, 15, 60, 90, 24 * 60 + 5] {
            let window = MeetingWindow::parse("2025-03-01T23:30:00", minutes).unwrap();
            assert_eq!(window.end - window.start, Duration::minutes(minutes));
        }
        let window = MeetingWindow::parse("2025-03-01T23:30:00", 45).unwrap();
        assert_eq!(window.end.to_rfc3339(), "2025-03-02T00:15:00+00:00");
    }

    #[test]
    fn test_window_rejects_non_positive_duration() {
        let err = MeetingWindow::parse("2025-03-01T10:00:00", 0).unwrap_err();
        assert!(err.to_string().contains("Error: Duration"));
        assert!(MeetingWindow::parse("2025-03-01T10:00:00", -30).is_err());
        assert!(MeetingWindow::parse("2025-03-01T10:00:00", i64::MAX).is_err());
    }

    #[test]
    fn test_event_payload_shape() {
        let window = MeetingWindow::parse("2025-03-01T14:00:00", 30).unwrap();
        let event = CalendarEvent::new(&window, "client@example.com", &MeetingSettings::default());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["summary"], "Sales Meeting");
        assert_eq!(json["start"]["dateTime"], "2025-03-01T14:00:00+00:00");
        assert_eq!(json["end"]["dateTime"], "2025-03-01T14:30:00+00:00");
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert_eq!(json["attendees"][0]["email"], "client@example.com");
        assert_eq!(json["reminders"]["useDefault"], true);
    }

    #[tokio::test]
    async fn test_invalid_date_makes_no_calls() {
        let (base, recorded) = calendar_server(Some("https://calendar/evt1")).await;
        let credentials = Arc::new(CountingToken::default());
        let scheduler = scheduler(credentials.clone(), &base);

        for bad in ["next tuesday", "2025-02-30T10:00:00", "10am"] {
            let outcome = scheduler.schedule("client@example.com", bad, Some(60)).await;
            assert!(!outcome.ok);
            assert!(outcome.message.starts_with("Error"));
        }

        let outcome = scheduler.schedule("client@example.com", "2025-03-01T10:00:00", Some(0)).await;
        assert!(outcome.message.starts_with("Error"));

        assert_eq!(credentials.calls.load(Ordering::SeqCst), 0);
        assert!(recorded.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_success() {
        let (base, recorded) = calendar_server(Some("https://calendar.google.com/event?eid=1")).await;
        let credentials = Arc::new(CountingToken::default());
        let scheduler = scheduler(credentials.clone(), &base);

        let outcome = scheduler
            .schedule("client@example.com", "2025-03-01T14:00:00", Some(45))
            .await;

        assert!(outcome.ok, "{}", outcome.message);
        assert!(outcome.message.starts_with("Meeting scheduled successfully"));
        assert!(outcome.message.contains("With: client@example.com"));
        assert!(outcome.message.contains("Start: 2025-03-01 14:00"));
        assert!(outcome.message.contains("Duration: 45 minutes"));
        assert!(outcome.message.contains("https://calendar.google.com/event?eid=1"));

        assert_eq!(*recorded.calendars.lock().unwrap(), vec!["primary".to_string()]);
        let events = recorded.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0.get("sendUpdates").map(String::as_str), Some("all"));
        assert_eq!(events[0].1["end"]["dateTime"], "2025-03-01T14:45:00+00:00");
    }

    #[tokio::test]
    async fn test_shared_calendar_id_reaches_server_intact() {
        let (base, recorded) = calendar_server(Some("https://calendar/evt1")).await;
        let holidays = "en.usa#holiday@group.v.calendar.google.com";
        let scheduler = MeetingScheduler::new(
            Arc::new(CountingToken::default()),
            &base,
            holidays,
            MeetingSettings::default(),
        );

        let outcome = scheduler.schedule("c@x.com", "2025-03-01T09:00:00", Some(30)).await;
        assert!(outcome.ok, "{}", outcome.message);
        assert_eq!(*recorded.calendars.lock().unwrap(), vec![holidays.to_string()]);
        let events = recorded.events.lock().unwrap();
        assert_eq!(events[0].0.get("sendUpdates").map(String::as_str), Some("all"));
    }

    #[tokio::test]
    async fn test_default_duration_and_missing_link() {
        let (base, _) = calendar_server(None).await;
        let scheduler = scheduler(Arc::new(CountingToken::default()), &base);

        let outcome = scheduler.schedule("c@x.com", "2025-03-01T09:00:00", None).await;
        assert!(outcome.message.contains("Duration: 60 minutes"));
        assert!(outcome.message.contains("Calendar Link: No link available"));
    }

    #[tokio::test]
    async fn test_failures_become_failed_text() {
        let scheduler_auth = scheduler(Arc::new(Failing), "http://127.0.0.1:1");
        let outcome = scheduler_auth
            .schedule("c@x.com", "2025-03-01T09:00:00", None)
            .await;
        assert!(!outcome.ok);
        assert!(outcome.message.starts_with("Failed to schedule meeting"));

        let scheduler_net = scheduler(Arc::new(CountingToken::default()), "http://127.0.0.1:1");
        let outcome = scheduler_net
            .schedule("c@x.com", "2025-03-01T09:00:00", None)
            .await;
        assert!(outcome.message.starts_with("Failed"));
    }
}
