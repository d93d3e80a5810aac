//! Answer questions about a web page fetched as markdown.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{ensure_success, format_chat_history, question_fields, truncate_chars, QuestionArgs};
use crate::config::{Prompts, WebsiteSettings};
use crate::error::{AgentError, Result};
use crate::model::{self, ChatModel};
use crate::tools::{Capability, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const NAME: &str = "website_agent";

pub fn descriptor() -> ToolDescriptor {
    question_fields(
        ToolDescriptor::new(
            NAME,
            "Fetch a web page, convert it to markdown, and answer questions about it.",
        )
        .action("answer a question about the web page"),
        "Website URL to analyse (http or https).",
        "Question about the fetched page content.",
    )
}

pub struct WebsiteAgent {
    http: reqwest::Client,
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
    reader_base: String,
    max_chars: usize,
}

impl WebsiteAgent {
    pub fn new(
        http: reqwest::Client,
        model: Arc<dyn ChatModel>,
        prompts: Arc<Prompts>,
        settings: &WebsiteSettings,
    ) -> Self {
        Self {
            http,
            model,
            prompts,
            reader_base: settings.reader_base.clone(),
            max_chars: settings.max_chars,
        }
    }

    /// Page content as markdown, via the reader proxy.
    #[instrument(skip(self))]
    pub async fn fetch_markdown(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}{}", self.reader_base, url))
            .header("Accept", "text/plain")
            .send()
            .await?;
        let markdown = ensure_success(response, "Page reader").await?.text().await?;

        if markdown.trim().is_empty() {
            return Err(AgentError::Tool(format!("{} has no readable content", url)));
        }

        debug!("Fetched {} characters of markdown", markdown.len());
        Ok(truncate_chars(&markdown, self.max_chars))
    }
}

#[async_trait]
impl Capability for WebsiteAgent {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: QuestionArgs = args.parse()?;
        let markdown = self.fetch_markdown(&args.url).await?;

        let mut vars = HashMap::new();
        vars.insert("url".to_string(), args.url.clone());
        vars.insert("context".to_string(), markdown);
        vars.insert(
            "chat_history".to_string(),
            format_chat_history(args.chat_history.as_deref()),
        );
        vars.insert("question".to_string(), args.question);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.website.template, &vars);
        Ok(model::answer(self.model.as_ref(), prompt).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedModel;
    use crate::model::AssistantTurn;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent(base: &str, model: Arc<ScriptedModel>) -> WebsiteAgent {
        WebsiteAgent::new(
            reqwest::Client::new(),
            model,
            Arc::new(Prompts::default()),
            &WebsiteSettings {
                reader_base: format!("{}/", base),
                max_chars: 1_000,
            },
        )
    }

    #[tokio::test]
    async fn test_answers_from_page_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Pricing\nFree tier: 100 calls"))
            .expect(1)
            .mount(&server)
            .await;

        let model = Arc::new(ScriptedModel::new(vec![AssistantTurn::text("100 calls")]));
        let args = descriptor()
            .input_schema
            .validate(&json!({
                "url": "https://example.com/pricing",
                "question": "How many free calls?",
                "chat_history": [{"role": "user", "content": "earlier"}]
            }))
            .unwrap();

        let output = agent(&server.uri(), model.clone()).invoke(args).await.unwrap();
        assert_eq!(output, ToolOutput::Text("100 calls".to_string()));

        let prompt = &model.snapshots()[0][0].content;
        assert!(prompt.contains("Free tier: 100 calls"));
        assert!(prompt.contains("How many free calls?"));
        assert!(prompt.contains("user: earlier"));
        assert!(prompt.contains("https://example.com/pricing"));
    }

    #[tokio::test]
    async fn test_empty_page_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let model = Arc::new(ScriptedModel::new(vec![]));
        let err = agent(&server.uri(), model.clone())
            .fetch_markdown("https://example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no readable content"));
        assert_eq!(model.calls(), 0);
    }
}
