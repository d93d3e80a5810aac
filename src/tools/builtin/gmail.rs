//! Gmail tools. Only registered when the caller supplies a Google access token.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{ensure_success, max_results_field};
use crate::config::GoogleSettings;
use crate::error::Result;
use crate::tools::{Capability, FieldSpec, Secret, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const UNREAD: &str = "gmail_unread";
pub const LATEST: &str = "gmail_latest";
pub const MARK_READ: &str = "gmail_mark_read";
pub const SEND: &str = "gmail_send";

pub const TOOL_NAMES: &[&str] = &[UNREAD, LATEST, MARK_READ, SEND];

/// Token-bound Gmail REST client.
pub struct GmailClient {
    http: reqwest::Client,
    base: String,
    token: Secret,
    timeout: Duration,
}

/// Summary of one message.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MailSummary {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageMetadata {
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, settings: &GoogleSettings, token: Secret) -> Self {
        Self {
            http,
            base: settings.gmail_api_base.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(self.token.expose())
            .timeout(self.timeout)
    }

    /// Messages matching a search query or label, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &[(&str, &str)], max_results: u32) -> Result<Vec<MailSummary>> {
        let max = max_results.to_string();
        let response = self
            .request(reqwest::Method::GET, "/messages")
            .query(query)
            .query(&[("maxResults", max.as_str())])
            .send()
            .await?;
        let list: MessageList = ensure_success(response, "Gmail").await?.json().await?;
        debug!("Gmail listed {} message(s)", list.messages.len());

        let mut summaries = Vec::with_capacity(list.messages.len());
        for message in list.messages {
            match self.metadata(&message.id).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("Skipping message {}: {}", message.id, e),
            }
        }
        Ok(summaries)
    }

    async fn metadata(&self, id: &str) -> Result<MailSummary> {
        let response = self
            .request(reqwest::Method::GET, &format!("/messages/{}", id))
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await?;
        let data: MessageMetadata = ensure_success(response, "Gmail").await?.json().await?;

        let header = |wanted: &str| {
            data.payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(wanted))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };

        Ok(MailSummary {
            id: id.to_string(),
            subject: header("Subject"),
            from: header("From"),
            date: header("Date"),
            snippet: data.snippet.clone(),
        })
    }

    pub async fn mark_read(&self, id: &str) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, &format!("/messages/{}/modify", id))
            .json(&json!({"removeLabelIds": ["UNREAD"]}))
            .send()
            .await?;
        Ok(ensure_success(response, "Gmail").await?.json().await?)
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Value> {
        let raw = URL_SAFE.encode(build_rfc822(to, subject, body));
        let response = self
            .request(reqwest::Method::POST, "/messages/send")
            .json(&json!({"raw": raw}))
            .send()
            .await?;
        Ok(ensure_success(response, "Gmail").await?.json().await?)
    }
}

/// Plain-text message. Header values are kept on one line.
pub fn build_rfc822(to: &str, subject: &str, body: &str) -> String {
    let one_line = |s: &str| s.replace(['\r', '\n'], " ");
    format!(
        "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
        one_line(to.trim()),
        one_line(subject),
        body
    )
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Unread,
    Latest,
    MarkRead,
    Send,
}

/// One Gmail operation exposed as a tool.
pub struct GmailTool {
    client: Arc<GmailClient>,
    operation: Operation,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct MarkReadArgs {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct SendArgs {
    to: String,
    subject: String,
    #[serde(default)]
    body: String,
}

fn summaries_output(summaries: Vec<MailSummary>, empty: &str) -> Result<ToolOutput> {
    if summaries.is_empty() {
        return Ok(empty.into());
    }
    Ok(ToolOutput::Structured(serde_json::to_value(summaries)?))
}

#[async_trait]
impl Capability for GmailTool {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        match self.operation {
            Operation::Unread => {
                let args: ListArgs = args.parse()?;
                let summaries = self
                    .client
                    .list(&[("q", "is:unread")], args.max_results)
                    .await?;
                summaries_output(summaries, "No unread emails.")
            }
            Operation::Latest => {
                let args: ListArgs = args.parse()?;
                let summaries = self
                    .client
                    .list(&[("labelIds", "INBOX")], args.max_results)
                    .await?;
                summaries_output(summaries, "The inbox is empty.")
            }
            Operation::MarkRead => {
                let args: MarkReadArgs = args.parse()?;
                self.client.mark_read(args.message_id.trim()).await?;
                Ok(format!("Marked message {} as read.", args.message_id.trim()).into())
            }
            Operation::Send => {
                let args: SendArgs = args.parse()?;
                let sent = self.client.send(&args.to, &args.subject, &args.body).await?;
                let id = sent["id"].as_str().unwrap_or("unknown");
                Ok(format!("Email sent to {} (message id {}).", args.to.trim(), id).into())
            }
        }
    }
}

/// Gmail descriptors bound to `token`, in catalog order.
pub fn tools(
    http: reqwest::Client,
    settings: &GoogleSettings,
    token: Secret,
) -> Vec<(ToolDescriptor, Arc<dyn Capability>)> {
    let client = Arc::new(GmailClient::new(http, settings, token));
    let bind = |operation| -> Arc<dyn Capability> {
        Arc::new(GmailTool {
            client: Arc::clone(&client),
            operation,
        })
    };

    vec![
        (
            ToolDescriptor::new(UNREAD, "List unread Gmail messages with sender, subject and date.")
                .action("list unread emails")
                .field(max_results_field(10, 50, "Maximum number of messages (1-50).")),
            bind(Operation::Unread),
        ),
        (
            ToolDescriptor::new(LATEST, "List the most recent messages in the Gmail inbox.")
                .action("fetch the latest emails")
                .field(max_results_field(5, 50, "Maximum number of messages (1-50).")),
            bind(Operation::Latest),
        ),
        (
            ToolDescriptor::new(MARK_READ, "Mark a Gmail message as read.")
                .action("mark the email as read")
                .field(
                    FieldSpec::string("message_id", "Gmail message id, as listed by gmail_unread.")
                        .required()
                        .min_length(1),
                ),
            bind(Operation::MarkRead),
        ),
        (
            ToolDescriptor::new(SEND, "Send a plain-text email from the user's Gmail account.")
                .action("send the email")
                .field(FieldSpec::string("to", "Recipient email address.").required().min_length(3))
                .field(FieldSpec::string("subject", "Email subject line.").required())
                .field(
                    FieldSpec::string("body", "Plain-text email body.")
                        .default_value(json!("")),
                ),
            bind(Operation::Send),
        ),
    ]
}
