//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Agentic Browser Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = [
        (
            "Model",
            vec![check_model_key(settings)],
        ),
        (
            "Tools",
            vec![
                check_search_key(settings),
                check_github_token(settings),
                check_tool(&settings.youtube.ytdlp_path, install_hint_ytdlp()),
            ],
        ),
        (
            "Configuration",
            vec![check_config_file(config_path), check_temp_dir(settings)],
        ),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before starting the agent.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! The agent is ready to use.");
    }

    Ok(())
}

/// Show only the ends of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_model_key(settings: &Settings) -> CheckResult {
    let name = format!("LLM ({})", settings.llm.model);
    let endpoint = settings.llm.api_base.as_deref().filter(|b| !b.trim().is_empty());
    match (settings.llm.resolved_api_key(), endpoint) {
        (Some(key), _) => CheckResult::ok(&name, &format!("API key configured ({})", mask(&key))),
        (None, Some(base)) => CheckResult::warning(
            &name,
            &format!("no API key, using {}", base),
            "Fine for local endpoints; set OPENAI_API_KEY otherwise",
        ),
        (None, None) => CheckResult::error(
            &name,
            "OPENAI_API_KEY not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

fn check_search_key(settings: &Settings) -> CheckResult {
    match settings.search.resolved_api_key() {
        Some(key) => CheckResult::ok("websearch", &format!("Tavily key configured ({})", mask(&key))),
        None => CheckResult::warning(
            "websearch",
            "TAVILY_API_KEY not set",
            "Web search calls will fail until a key is configured",
        ),
    }
}

fn check_github_token(settings: &Settings) -> CheckResult {
    match settings.github.resolved_token() {
        Some(_) => CheckResult::ok("github_agent", "token configured"),
        None => CheckResult::warning(
            "github_agent",
            "no GITHUB_TOKEN, unauthenticated rate limits apply",
            "Set GITHUB_TOKEN for 5000 requests/hour",
        ),
    }
}

/// Check if an external tool is available.
fn check_tool(binary: &str, hint: &str) -> CheckResult {
    let name = format!("youtube_agent ({})", binary);
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .chars()
                .take(50)
                .collect::<String>();
            CheckResult::ok(&name, &version)
        }
        Ok(_) => CheckResult::error(&name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(&name, "not found", hint)
        }
        Err(e) => CheckResult::error(&name, &format!("error: {}", e), hint),
    }
}

/// Check if config file exists and parses.
fn check_config_file(config_path: &Path) -> CheckResult {
    if !config_path.exists() {
        return CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: agentic-browser config edit",
        );
    }
    match Settings::load_from(Some(&config_path.to_path_buf())) {
        Ok(_) => CheckResult::ok("Config file", &config_path.display().to_string()),
        Err(e) => CheckResult::error("Config file", &e.to_string(), "Fix the file or delete it"),
    }
}

fn check_temp_dir(settings: &Settings) -> CheckResult {
    let dir = settings.temp_dir();
    if dir.exists() {
        CheckResult::ok("Temp directory", &dir.display().to_string())
    } else {
        CheckResult::warning(
            "Temp directory",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "***");
        assert_eq!(mask("sk-abcdefghijklmnop"), "sk-a...mnop");
    }

    #[test]
    fn test_model_key_with_local_endpoint() {
        let mut settings = Settings::default();
        settings.llm.api_key = None;
        settings.llm.api_base = Some("http://localhost:11434/v1".to_string());
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert_eq!(check_model_key(&settings).status, CheckStatus::Warning);
        }
    }

    #[test]
    fn test_missing_binary() {
        let result = check_tool("definitely-not-a-real-binary-xyz", "install it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "not found");
    }

    #[test]
    fn test_invalid_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[agent]\nmax_steps = 0\n").unwrap();
        assert_eq!(check_config_file(file.path()).status, CheckStatus::Error);
        assert_eq!(
            check_config_file(Path::new("/nonexistent/config.toml")).status,
            CheckStatus::Warning
        );
    }
}
