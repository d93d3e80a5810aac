//! Configuration settings for the agent service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub search: SearchSettings,
    pub website: WebsiteSettings,
    pub github: GithubSettings,
    pub youtube: YoutubeSettings,
    pub google: GoogleSettings,
    pub portal: PortalSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary files (subtitle downloads).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/agentic-browser".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP/WebSocket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5454,
        }
    }
}

/// Chat model settings (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model name sent with every completion request.
    pub model: String,
    /// Override for the API base URL. None = api.openai.com.
    pub api_base: Option<String>,
    /// API key. Falls back to OPENAI_API_KEY when unset.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: 120,
            temperature: 0.4,
        }
    }
}

impl LlmSettings {
    /// API key from the file, else from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| env_non_empty("OPENAI_API_KEY"))
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model calls per invocation.
    pub max_steps: usize,
    /// Per tool call timeout in seconds.
    pub tool_timeout_secs: u64,
    /// System prompt injected when the history does not start with one.
    pub system_prompt: String,
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that maintains conversation context and \
remembers useful information shared by users. Use the available tools \
when they can improve the answer, otherwise reply directly.";

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 15,
            tool_timeout_secs: 45,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Web search (Tavily) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub api_base: String,
    /// Tavily API key. Falls back to TAVILY_API_KEY when unset.
    pub api_key: Option<String>,
    /// Characters of each result kept in the tool output.
    pub snippet_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.tavily.com".to_string(),
            api_key: None,
            snippet_chars: 320,
        }
    }
}

impl SearchSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| env_non_empty("TAVILY_API_KEY"))
    }
}

/// Website fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteSettings {
    /// Reader proxy that returns a page as markdown; the target URL is appended.
    pub reader_base: String,
    /// Maximum markdown characters passed to the model.
    pub max_chars: usize,
}

impl Default for WebsiteSettings {
    fn default() -> Self {
        Self {
            reader_base: "https://r.jina.ai/".to_string(),
            max_chars: 60_000,
        }
    }
}

/// GitHub repository ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub api_base: String,
    /// Optional token for higher rate limits. Falls back to GITHUB_TOKEN.
    pub token: Option<String>,
    /// Number of source files whose contents are included.
    pub max_files: usize,
    /// Per-file byte cap for included contents.
    pub max_file_bytes: usize,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            max_files: 20,
            max_file_bytes: 8_000,
        }
    }
}

impl GithubSettings {
    pub fn resolved_token(&self) -> Option<String> {
        non_empty(self.token.clone()).or_else(|| env_non_empty("GITHUB_TOKEN"))
    }
}

/// YouTube transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// yt-dlp executable.
    pub ytdlp_path: String,
    /// Subtitle language requested from yt-dlp.
    pub subtitle_lang: String,
    /// Maximum transcript characters passed to the model.
    pub max_transcript_chars: usize,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            subtitle_lang: "en".to_string(),
            max_transcript_chars: 60_000,
        }
    }
}

/// Google API endpoints used by the Gmail and Calendar tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub gmail_api_base: String,
    pub calendar_api_base: String,
    pub request_timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            gmail_api_base: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            calendar_api_base: "https://www.googleapis.com/calendar/v3/calendars/primary"
                .to_string(),
            request_timeout_secs: 8,
        }
    }
}

/// Student portal settings for the attendance tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub api_base: String,
    /// Semester used when the model does not name one.
    pub default_semester: String,
    /// Semester code -> registration id.
    pub semesters: BTreeMap<String, String>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        let semesters = [
            ("2026EVESEM", "JIRUM25100000001"),
            ("2025ODDSEM", "JIRUM25030000001"),
            ("2025EVESEM", "JIRUM24100000001"),
            ("2024ODDSEM", "JIRUM24030000001"),
            ("2024EVESEM", "JIRUM23110000001"),
            ("SUMMER2023", "JIRUM23050000001"),
            ("2023ODDSEM", "JIRUM23040000001"),
            ("2023EVESEM", "JIRUM22110000001"),
            ("2022ODDSEM", "JIRUM22050000001"),
        ]
        .into_iter()
        .map(|(code, id)| (code.to_string(), id.to_string()))
        .collect();

        Self {
            api_base: "https://webportal.jiit.ac.in:6011/StudentPortalAPI".to_string(),
            default_semester: "2025ODDSEM".to_string(),
            semesters,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AgentError;

        if self.agent.max_steps == 0 {
            return Err(AgentError::Config("agent.max_steps must be at least 1".to_string()));
        }
        if self.agent.tool_timeout_secs == 0 {
            return Err(AgentError::Config(
                "agent.tool_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.portal.semesters.contains_key(&self.portal.default_semester) {
            return Err(AgentError::Config(format!(
                "portal.default_semester '{}' is not listed in portal.semesters",
                self.portal.default_semester
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AgentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentic-browser")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_non_empty(key: &str) -> Option<String> {
    non_empty(std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 5454);
        assert_eq!(settings.portal.semesters.len(), 9);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_steps = 4

            [portal]
            default_semester = "2024EVESEM"
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.max_steps, 4);
        assert_eq!(settings.agent.tool_timeout_secs, 45);
        // Table entries not mentioned in the file fall back to the defaults.
        assert_eq!(settings.portal.semesters.len(), 9);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_semester_rejected() {
        let mut settings = Settings::default();
        settings.portal.default_semester = "2030ODDSEM".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_steps_rejected() {
        let mut settings = Settings::default();
        settings.agent.max_steps = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.server.port = 9000;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 9000);
    }
}
