//! Configuration module.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{GithubPrompts, InjectionPrompts, Prompts, WebsitePrompts, YoutubePrompts};
pub use settings::{
    AgentSettings, GeneralSettings, GithubSettings, GoogleSettings, LlmSettings, PortalSettings,
    PromptSettings, SearchSettings, ServerSettings, Settings, WebsiteSettings, YoutubeSettings,
    DEFAULT_SYSTEM_PROMPT,
};
