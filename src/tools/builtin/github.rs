//! Answer questions about a GitHub repository.
//!
//! Repository context (summary, file tree, README and leading source files)
//! is assembled from the GitHub REST API and handed to the model.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{ensure_success, format_chat_history, question_fields, QuestionArgs};
use crate::config::{GithubSettings, Prompts};
use crate::error::{AgentError, Result};
use crate::model::{self, ChatModel};
use crate::tools::{Capability, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const NAME: &str = "github_agent";

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "rb",
    "php", "swift", "scala", "toml", "json", "yaml", "yml", "sh", "html", "css", "sql", "md",
];

pub fn descriptor() -> ToolDescriptor {
    question_fields(
        ToolDescriptor::new(
            NAME,
            "Answer questions about a GitHub repository using repository contents.",
        )
        .action("answer a question about the GitHub repository"),
        "Full URL to a public GitHub repository.",
        "Question about the repository.",
    )
}

/// `owner/repo` parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url.trim())
            .map_err(|e| AgentError::InvalidInput(format!("invalid repository URL: {}", e)))?;

        match parsed.host_str() {
            Some("github.com") | Some("www.github.com") => {}
            _ => {
                return Err(AgentError::InvalidInput(format!(
                    "{} is not a github.com URL",
                    url
                )))
            }
        }

        let mut segments = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();

        match (segments.next(), segments.next()) {
            (Some(owner), Some(repo)) => Ok(Self {
                owner: owner.to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
            }),
            _ => Err(AgentError::InvalidInput(format!(
                "{} does not name a repository (expected github.com/<owner>/<repo>)",
                url
            ))),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Repository context handed to the prompt.
#[derive(Debug, Clone)]
pub struct RepoDigest {
    pub summary: String,
    pub tree: String,
    pub content: String,
}

pub struct GithubAgent {
    http: reqwest::Client,
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
    api_base: String,
    token: Option<String>,
    max_files: usize,
    max_file_bytes: usize,
}

impl GithubAgent {
    pub fn new(
        http: reqwest::Client,
        model: Arc<dyn ChatModel>,
        prompts: Arc<Prompts>,
        settings: &GithubSettings,
    ) -> Self {
        Self {
            http,
            model,
            prompts,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.resolved_token(),
            max_files: settings.max_files,
            max_file_bytes: settings.max_file_bytes,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .header("User-Agent", "agentic-browser")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn get_raw(&self, path: &str) -> Result<Option<String>> {
        let response = self
            .get(path)
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response, "GitHub").await?.text().await?))
    }

    /// Build summary, tree and file contents for `repo`.
    #[instrument(skip(self), fields(repo = %repo.full_name()))]
    pub async fn digest(&self, repo: &RepoRef) -> Result<RepoDigest> {
        let base = format!("/repos/{}/{}", repo.owner, repo.repo);

        let response = self.get(&base).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AgentError::Tool(format!(
                "repository {} was not found or is private",
                repo.full_name()
            )));
        }
        let info: RepoInfo = ensure_success(response, "GitHub").await?.json().await?;
        let branch = if info.default_branch.is_empty() {
            "main".to_string()
        } else {
            info.default_branch.clone()
        };

        let response = self
            .get(&format!("{}/git/trees/{}?recursive=1", base, branch))
            .send()
            .await?;
        let tree: TreeResponse = ensure_success(response, "GitHub").await?.json().await?;
        if tree.truncated {
            warn!("GitHub truncated the file tree for {}", repo.full_name());
        }

        let readme = self.get_raw(&format!("{}/readme", base)).await?;
        let selected = select_files(&tree.tree, self.max_files);
        debug!("Fetching {} file(s)", selected.len());

        let fetches = selected.iter().map(|path| {
            let url = format!("{}/contents/{}?ref={}", base, path, branch);
            async move { (path.clone(), self.get_raw(&url).await) }
        });

        let mut content = String::new();
        if let Some(readme) = &readme {
            content.push_str(&file_block("README", readme, self.max_file_bytes));
        }
        for (path, body) in join_all(fetches).await {
            match body {
                Ok(Some(text)) => content.push_str(&file_block(&path, &text, self.max_file_bytes)),
                Ok(None) => {}
                Err(e) => warn!("Skipping {}: {}", path, e),
            }
        }

        let file_count = tree.tree.iter().filter(|e| e.kind == "blob").count();
        let full_name = if info.full_name.is_empty() {
            repo.full_name()
        } else {
            info.full_name
        };
        let mut summary = format!("Repository: {}\n", full_name);
        if let Some(description) = info.description.filter(|d| !d.is_empty()) {
            summary.push_str(&format!("Description: {}\n", description));
        }
        if let Some(language) = info.language {
            summary.push_str(&format!("Primary language: {}\n", language));
        }
        summary.push_str(&format!(
            "Stars: {}\nDefault branch: {}\nFiles in repository: {}\nFiles analyzed: {}",
            info.stargazers_count,
            branch,
            file_count,
            selected.len() + usize::from(readme.is_some())
        ));

        Ok(RepoDigest {
            summary,
            tree: render_tree(&repo.repo, &tree.tree),
            content,
        })
    }
}

/// Shallowest source files first, README excluded.
pub fn select_files(entries: &[TreeEntry], max_files: usize) -> Vec<String> {
    let mut candidates: Vec<&TreeEntry> = entries
        .iter()
        .filter(|e| e.kind == "blob")
        .filter(|e| {
            let lower = e.path.to_lowercase();
            let file_name = lower.rsplit('/').next().unwrap_or(&lower);
            !file_name.starts_with("readme")
                && !lower.ends_with(".lock")
                && !lower.ends_with("package-lock.json")
                && lower
                    .rsplit_once('.')
                    .map(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext))
                    .unwrap_or(false)
        })
        .collect();

    candidates.sort_by(|a, b| {
        let depth = |e: &TreeEntry| e.path.matches('/').count();
        depth(a).cmp(&depth(b)).then_with(|| a.path.cmp(&b.path))
    });

    candidates
        .into_iter()
        .take(max_files)
        .map(|e| e.path.clone())
        .collect()
}

/// Indented directory listing.
pub fn render_tree(root: &str, entries: &[TreeEntry]) -> String {
    let mut lines = vec![format!("{}/", root)];
    for entry in entries {
        let depth = entry.path.matches('/').count() + 1;
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        let suffix = if entry.kind == "tree" { "/" } else { "" };
        lines.push(format!("{}{}{}", "    ".repeat(depth), name, suffix));
    }
    lines.join("\n")
}

fn file_block(path: &str, text: &str, max_bytes: usize) -> String {
    let mut body = text;
    let mut note = "";
    if body.len() > max_bytes {
        let mut cut = max_bytes;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body = &body[..cut];
        note = "\n[... truncated]";
    }
    format!(
        "================================================\nFILE: {}\n================================================\n{}{}\n\n",
        path, body, note
    )
}

#[async_trait]
impl Capability for GithubAgent {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: QuestionArgs = args.parse()?;
        let repo = RepoRef::parse(&args.url)?;
        let digest = self.digest(&repo).await?;

        let mut vars = HashMap::new();
        vars.insert("summary".to_string(), digest.summary);
        vars.insert("tree".to_string(), digest.tree);
        vars.insert("content".to_string(), digest.content);
        vars.insert(
            "chat_history".to_string(),
            format_chat_history(args.chat_history.as_deref()),
        );
        vars.insert("question".to_string(), args.question);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.github.template, &vars);
        Ok(model::answer(self.model.as_ref(), prompt).await?.into())
    }
}
