//! Google Calendar tools, bound to the caller's access token.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::{ensure_success, max_results_field};
use crate::config::GoogleSettings;
use crate::error::{AgentError, Result};
use crate::tools::{Capability, FieldSpec, Secret, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const EVENTS: &str = "calendar_events";
pub const CREATE: &str = "calendar_create";

pub const TOOL_NAMES: &[&str] = &[EVENTS, CREATE];

pub struct CalendarClient {
    http: reqwest::Client,
    base: String,
    token: Secret,
    timeout: Duration,
}

/// Upcoming event as reported to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Value>,
}

fn event_time(value: &Value) -> String {
    value["dateTime"]
        .as_str()
        .or_else(|| value["date"].as_str())
        .unwrap_or_default()
        .to_string()
}

impl EventSummary {
    fn from_json(item: &Value) -> Self {
        Self {
            id: item["id"].as_str().unwrap_or_default().to_string(),
            summary: item["summary"].as_str().unwrap_or("No title").to_string(),
            start: event_time(&item["start"]),
            end: event_time(&item["end"]),
            location: item["location"].as_str().map(str::to_string),
        }
    }
}

/// Accept RFC 3339 or a naive `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC).
pub fn parse_time(input: &str) -> Result<DateTime<FixedOffset>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(AgentError::InvalidInput(format!(
        "'{}' is not an ISO 8601 date-time (e.g. 2025-01-31T15:00:00Z)",
        input
    )))
}

fn rfc3339(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CalendarClient {
    pub fn new(http: reqwest::Client, settings: &GoogleSettings, token: Secret) -> Self {
        Self {
            http,
            base: settings.calendar_api_base.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    #[instrument(skip(self))]
    pub async fn upcoming(&self, max_results: u32, now: DateTime<Utc>) -> Result<Vec<EventSummary>> {
        let response = self
            .http
            .get(format!("{}/events", self.base))
            .bearer_auth(self.token.expose())
            .timeout(self.timeout)
            .query(&[
                ("maxResults", max_results.to_string()),
                ("orderBy", "startTime".to_string()),
                ("singleEvents", "true".to_string()),
                ("timeMin", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ])
            .send()
            .await?;
        let list: EventList = ensure_success(response, "Google Calendar").await?.json().await?;
        Ok(list.items.iter().map(EventSummary::from_json).collect())
    }

    pub async fn create(
        &self,
        summary: &str,
        start: &str,
        end: &str,
        description: &str,
    ) -> Result<Value> {
        let body = json!({
            "summary": summary,
            "description": description,
            "start": {"dateTime": start, "timeZone": "UTC"},
            "end": {"dateTime": end, "timeZone": "UTC"},
        });
        let response = self
            .http
            .post(format!("{}/events", self.base))
            .bearer_auth(self.token.expose())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        Ok(ensure_success(response, "Google Calendar").await?.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct EventsArgs {
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    summary: String,
    start_time: String,
    end_time: String,
    description: String,
}

struct UpcomingEvents(Arc<CalendarClient>);

#[async_trait]
impl Capability for UpcomingEvents {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: EventsArgs = args.parse()?;
        let events = self.0.upcoming(args.max_results, Utc::now()).await?;
        if events.is_empty() {
            return Ok("No upcoming events found.".into());
        }
        Ok(ToolOutput::Structured(serde_json::to_value(events)?))
    }
}

struct CreateEvent(Arc<CalendarClient>);

#[async_trait]
impl Capability for CreateEvent {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: CreateArgs = args.parse()?;
        let start = parse_time(&args.start_time)?;
        let end = parse_time(&args.end_time)?;
        if end <= start {
            return Err(AgentError::InvalidInput(
                "end_time must be after start_time".to_string(),
            ));
        }

        let (start, end) = (rfc3339(&start), rfc3339(&end));
        let created = self
            .0
            .create(args.summary.trim(), &start, &end, &args.description)
            .await?;

        let mut text = format!("Created event \"{}\" from {} to {}.", args.summary.trim(), start, end);
        if let Some(link) = created["htmlLink"].as_str() {
            text.push_str(&format!(" Link: {}", link));
        }
        Ok(text.into())
    }
}

/// Calendar descriptors bound to `token`, in catalog order.
pub fn tools(
    http: reqwest::Client,
    settings: &GoogleSettings,
    token: Secret,
) -> Vec<(ToolDescriptor, Arc<dyn Capability>)> {
    let client = Arc::new(CalendarClient::new(http, settings, token));

    let upcoming: Arc<dyn Capability> = Arc::new(UpcomingEvents(Arc::clone(&client)));
    let create: Arc<dyn Capability> = Arc::new(CreateEvent(client));

    vec![
        (
            ToolDescriptor::new(EVENTS, "List upcoming events from the user's primary Google Calendar.")
                .action("fetch calendar events")
                .field(max_results_field(10, 50, "Maximum number of events (1-50).")),
            upcoming,
        ),
        (
            ToolDescriptor::new(CREATE, "Create an event in the user's primary Google Calendar.")
                .action("create the calendar event")
                .field(FieldSpec::string("summary", "Event title.").required().min_length(1))
                .field(
                    FieldSpec::string("start_time", "Start as ISO 8601, e.g. 2025-01-31T15:00:00Z.")
                        .required(),
                )
                .field(
                    FieldSpec::string("end_time", "End as ISO 8601, e.g. 2025-01-31T16:00:00Z.")
                        .required(),
                )
                .field(
                    FieldSpec::string("description", "Event description.")
                        .default_value(json!("Created via agent")),
                ),
            create,
        ),
    ]
}
