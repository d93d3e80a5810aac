//! Tools command implementation.

use anyhow::Result;
use std::sync::Arc;

use crate::cli::preflight::{self, Operation};
use crate::cli::{CredentialArgs, Output};
use crate::config::{Prompts, Settings};
use crate::model::OpenAiModel;
use crate::tools::Toolbox;

/// Print the registry a request with these credentials would get.
pub fn run_tools(credentials: &CredentialArgs, settings: Settings) -> Result<()> {
    preflight::check(Operation::ListTools, &settings)?;

    let credentials = credentials.context()?;
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let model = Arc::new(OpenAiModel::new(&settings.llm)?);
    let toolbox = Toolbox::new(
        reqwest::Client::new(),
        model,
        Arc::new(settings),
        Arc::new(prompts),
    );
    let registry = toolbox.build_registry(&credentials)?;

    Output::header(&format!("Tools ({})", registry.len()));
    println!();
    for tool in registry.iter() {
        let fields: Vec<String> = tool
            .descriptor
            .input_schema
            .fields()
            .iter()
            .map(|f| {
                if f.required {
                    format!("{}*", f.name)
                } else {
                    f.name.clone()
                }
            })
            .collect();
        Output::tool(tool.name(), &tool.descriptor.description, &fields);
    }
    println!();

    if credentials.google_access_token().is_none() {
        Output::info("Pass --google-token to enable the Gmail and Calendar tools.");
    }
    if credentials.portal_session().is_none() {
        Output::info("Pass --portal-session to enable the attendance tool.");
    }
    Ok(())
}
