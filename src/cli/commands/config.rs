//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<PathBuf>, settings: Settings) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&redacted(settings))
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Edit => {
            // Create default config if it doesn't exist
            if !config_path.exists() {
                settings.save_to(&config_path)?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status();

            match status {
                Ok(s) if s.success() => match Settings::load_from(Some(&config_path)) {
                    Ok(_) => Output::success("Config saved."),
                    Err(e) => Output::warning(&format!("Config saved but is invalid: {}", e)),
                },
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Mask secrets before printing.
fn redacted(mut settings: Settings) -> Settings {
    let mask = |value: &mut Option<String>| {
        if value.as_deref().is_some_and(|v| !v.is_empty()) {
            *value = Some("***".to_string());
        }
    };
    mask(&mut settings.llm.api_key);
    mask(&mut settings.search.api_key);
    mask(&mut settings.github.token);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_masks_secrets() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("sk-secret".to_string());
        settings.github.token = Some(String::new());

        let shown = redacted(settings);
        assert_eq!(shown.llm.api_key.as_deref(), Some("***"));
        assert_eq!(shown.github.token.as_deref(), Some(""));
        assert!(shown.search.api_key.is_none());
    }
}
