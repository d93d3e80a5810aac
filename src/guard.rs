//! Prompt-injection screening for page HTML sent by the browser extension.

use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::Prompts;
use crate::error::{AgentError, Result};
use crate::model::{self, ChatModel};
use crate::tools::builtin::truncate_chars;

/// Compiled patterns for turning page HTML into markdown-ish text.
pub struct HtmlConverter {
    body: Regex,
    hidden: Regex,
    comment: Regex,
    heading: Regex,
    link: Regex,
    list_item: Regex,
    line_break: Regex,
    block: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

impl HtmlConverter {
    pub fn new() -> Self {
        Self {
            body: Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("Invalid regex"),
            hidden: Regex::new(
                r"(?is)<(?:script|style|noscript|template|svg|head)\b.*?</(?:script|style|noscript|template|svg|head)\s*>",
            )
            .expect("Invalid regex"),
            comment: Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"),
            heading: Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]\s*>").expect("Invalid regex"),
            link: Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
                .expect("Invalid regex"),
            list_item: Regex::new(r"(?i)<li[^>]*>").expect("Invalid regex"),
            line_break: Regex::new(r"(?i)<br\s*/?>").expect("Invalid regex"),
            block: Regex::new(
                r"(?i)</?(?:p|div|section|article|header|footer|main|nav|ul|ol|table|tr|blockquote|pre)\b[^>]*>",
            )
            .expect("Invalid regex"),
            tag: Regex::new(r"<[^>]+>").expect("Invalid regex"),
            spaces: Regex::new(r"[ \t]+").expect("Invalid regex"),
            blank_lines: Regex::new(r"\n{3,}").expect("Invalid regex"),
        }
    }

    /// Visible text with headings, links and list items kept as markdown.
    pub fn to_markdown(&self, html: &str) -> String {
        let html = self
            .body
            .captures(html)
            .and_then(|c| c.get(1))
            .map_or(html, |m| m.as_str());

        let text = self.hidden.replace_all(html, "");
        let text = self.comment.replace_all(&text, "");
        let text = self.heading.replace_all(&text, |caps: &Captures| {
            let level = caps[1].parse::<usize>().unwrap_or(1);
            format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
        });
        let text = self.link.replace_all(&text, "[$2]($1)");
        let text = self.list_item.replace_all(&text, "\n- ");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.block.replace_all(&text, "\n\n");
        let text = self.tag.replace_all(&text, "");
        let text = decode_entities(&text);

        let lines: Vec<String> = text
            .lines()
            .map(|line| self.spaces.replace_all(line.trim(), " ").into_owned())
            .collect();
        let joined = lines.join("\n");
        self.blank_lines
            .replace_all(joined.trim(), "\n\n")
            .into_owned()
    }
}

impl Default for HtmlConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// The model answers "true" for safe pages; anything else counts as unsafe.
pub fn parse_verdict(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches('`')
        .trim()
        .eq_ignore_ascii_case("true")
}

/// Ask the model whether `html` carries instructions aimed at the model.
pub async fn check_page(
    model: &dyn ChatModel,
    prompts: &Prompts,
    html: &str,
    max_chars: usize,
) -> Result<bool> {
    if html.trim().is_empty() {
        return Err(AgentError::InvalidInput("html must not be empty".to_string()));
    }

    let markdown = HtmlConverter::new().to_markdown(html);
    debug!("Screening {} chars of page text", markdown.len());

    let mut vars = HashMap::new();
    vars.insert(
        "markdown_text".to_string(),
        truncate_chars(&markdown, max_chars),
    );
    let prompt = prompts.render_with_custom(&prompts.injection.template, &vars);

    let answer = model::answer(model, prompt).await?;
    let safe = parse_verdict(&answer);
    info!("Page screened, safe = {}", safe);
    Ok(safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedModel;
    use crate::model::AssistantTurn;

    const PAGE: &str = r#"<html><head><title>t</title><style>body{}</style></head>
<body>
  <h2>Pricing &amp; plans</h2>
  <p>Free tier:&nbsp;100 calls</p>
  <script>steal()</script>
  <ul><li>One</li><li><a href="https://example.com/more">More</a></li></ul>
  <!-- hidden note -->
</body></html>"#;

    #[test]
    fn test_html_to_markdown() {
        let markdown = HtmlConverter::new().to_markdown(PAGE);
        assert!(markdown.starts_with("## Pricing & plans"));
        assert!(markdown.contains("Free tier: 100 calls"));
        assert!(markdown.contains("- One"));
        assert!(markdown.contains("- [More](https://example.com/more)"));
        assert!(!markdown.contains("steal"));
        assert!(!markdown.contains("hidden note"));
        assert!(!markdown.contains("body{}"));
        assert!(!markdown.contains("\n\n\n"));
    }

    #[test]
    fn test_fragment_without_body() {
        let markdown = HtmlConverter::new().to_markdown("Hello<br>world");
        assert_eq!(markdown, "Hello\nworld");
    }

    #[test]
    fn test_parse_verdict() {
        assert!(parse_verdict("true"));
        assert!(parse_verdict(" ```True``` \n"));
        assert!(!parse_verdict("false"));
        assert!(!parse_verdict("The page is true to its title"));
        assert!(!parse_verdict(""));
    }

    #[tokio::test]
    async fn test_check_page_sends_markdown_to_model() {
        let model = ScriptedModel::new(vec![AssistantTurn::text("false")]);
        let safe = check_page(&model, &Prompts::default(), PAGE, 10_000)
            .await
            .unwrap();
        assert!(!safe);

        let prompt = &model.snapshots()[0][0].content;
        assert!(prompt.contains("Free tier: 100 calls"));
        assert!(!prompt.contains("{{markdown_text}}"));
    }

    #[tokio::test]
    async fn test_empty_html_rejected_without_model_call() {
        let model = ScriptedModel::new(vec![]);
        let err = check_page(&model, &Prompts::default(), "  ", 10_000)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert_eq!(model.calls(), 0);
    }
}
