//! Process-wide tool factory.
//!
//! Holds the long-lived handles (HTTP pool, chat model, settings) and builds a
//! fresh [`ToolRegistry`] for every invocation from its credentials.

use std::sync::Arc;

use super::builtin::{attendance, calendar, github, gmail, search, website, youtube};
use super::{Capability, CredentialContext, ToolDescriptor, ToolRegistry};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::model::ChatModel;

const NO_GOOGLE_TOKEN: &str = "no Google access token was supplied for this request";
const NO_PORTAL_SESSION: &str = "no portal login session was supplied for this request";

pub struct Toolbox {
    http: reqwest::Client,
    model: Arc<dyn ChatModel>,
    settings: Arc<Settings>,
    prompts: Arc<Prompts>,
    /// Unconditional tools, shared by every registry.
    base: Vec<(ToolDescriptor, Arc<dyn Capability>)>,
}

impl Toolbox {
    pub fn new(
        http: reqwest::Client,
        model: Arc<dyn ChatModel>,
        settings: Arc<Settings>,
        prompts: Arc<Prompts>,
    ) -> Self {
        let search: Arc<dyn Capability> =
            Arc::new(search::WebSearch::new(http.clone(), &settings.search));
        let github: Arc<dyn Capability> = Arc::new(github::GithubAgent::new(
            http.clone(),
            Arc::clone(&model),
            Arc::clone(&prompts),
            &settings.github,
        ));
        let website: Arc<dyn Capability> = Arc::new(website::WebsiteAgent::new(
            http.clone(),
            Arc::clone(&model),
            Arc::clone(&prompts),
            &settings.website,
        ));
        let youtube: Arc<dyn Capability> = Arc::new(youtube::YoutubeAgent::new(
            Arc::clone(&model),
            Arc::clone(&prompts),
            &settings.youtube,
            settings.temp_dir(),
        ));

        let base = vec![
            (search::descriptor(), search),
            (github::descriptor(), github),
            (website::descriptor(), website),
            (youtube::descriptor(), youtube),
        ];

        Self {
            http,
            model,
            settings,
            prompts,
            base,
        }
    }

    /// Replace the unconditional tools (tests and embedders).
    pub fn with_base_tools(mut self, tools: Vec<(ToolDescriptor, Arc<dyn Capability>)>) -> Self {
        self.base = tools;
        self
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Build the registry for one invocation. Performs no I/O.
    ///
    /// Order: unconditional tools, then Gmail and Calendar when a Google token
    /// is present, then attendance when a portal session is present.
    pub fn build_registry(&self, credentials: &CredentialContext) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        for (descriptor, capability) in &self.base {
            registry.register(descriptor.clone(), Arc::clone(capability))?;
        }

        match credentials.google_access_token() {
            Some(token) => {
                let google = &self.settings.google;
                let tools = gmail::tools(self.http.clone(), google, token.clone())
                    .into_iter()
                    .chain(calendar::tools(self.http.clone(), google, token.clone()));
                for (descriptor, capability) in tools {
                    registry.register(descriptor, capability)?;
                }
            }
            None => {
                for name in gmail::TOOL_NAMES.iter().chain(calendar::TOOL_NAMES) {
                    registry.withhold(name, NO_GOOGLE_TOKEN);
                }
            }
        }

        match credentials.portal_session() {
            Some(session) => {
                let portal = &self.settings.portal;
                registry.register(
                    attendance::descriptor(portal),
                    Arc::new(attendance::Attendance::new(
                        self.http.clone(),
                        portal,
                        session.clone(),
                    )),
                )?;
            }
            None => registry.withhold(attendance::NAME, NO_PORTAL_SESSION),
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedModel;
    use serde_json::json;

    fn toolbox() -> Toolbox {
        Toolbox::new(
            reqwest::Client::new(),
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(Settings::default()),
            Arc::new(Prompts::default()),
        )
    }

    const BASE: [&str; 4] = ["websearch", "github_agent", "website_agent", "youtube_agent"];

    #[test]
    fn test_empty_context_gives_unconditional_tools_in_order() {
        let toolbox = toolbox();
        let first = toolbox.build_registry(&CredentialContext::new()).unwrap();
        let second = toolbox.build_registry(&CredentialContext::new()).unwrap();

        assert_eq!(first.names(), BASE);
        assert_eq!(first.names(), second.names());
    }

    #[test]
    fn test_google_token_adds_gmail_and_calendar_only() {
        let registry = toolbox()
            .build_registry(&CredentialContext::new().with_google_token("x"))
            .unwrap();

        let mut expected: Vec<&str> = BASE.to_vec();
        expected.extend(gmail::TOOL_NAMES);
        expected.extend(calendar::TOOL_NAMES);
        assert_eq!(registry.names(), expected);
        assert!(!registry.contains(attendance::NAME));
    }

    #[test]
    fn test_portal_session_adds_attendance() {
        let registry = toolbox()
            .build_registry(&CredentialContext::new().with_portal_session(json!({"token": "t"})))
            .unwrap();
        assert_eq!(registry.names().last(), Some(&attendance::NAME));
        assert!(!registry.contains(gmail::SEND));
    }

    #[test]
    fn test_withheld_tools_explain_missing_credential() {
        let registry = toolbox().build_registry(&CredentialContext::new()).unwrap();
        let message = registry.unknown_tool_message(gmail::SEND);
        assert!(message.contains("no Google access token"));
        assert!(registry
            .unknown_tool_message(attendance::NAME)
            .contains("portal login session"));
    }

    #[test]
    fn test_registries_are_independent() {
        let toolbox = toolbox();
        let with_token = toolbox
            .build_registry(&CredentialContext::new().with_google_token("secret"))
            .unwrap();
        let without = toolbox.build_registry(&CredentialContext::new()).unwrap();
        assert!(with_token.contains(gmail::UNREAD));
        assert!(!without.contains(gmail::UNREAD));
    }
}
