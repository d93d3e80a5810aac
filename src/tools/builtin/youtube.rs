//! Answer questions about a YouTube video from its metadata and subtitles.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::vtt::SubtitleCleaner;
use super::{format_chat_history, question_fields, truncate_chars, QuestionArgs};
use crate::config::{Prompts, YoutubeSettings};
use crate::error::{AgentError, Result};
use crate::model::{self, ChatModel};
use crate::tools::{Capability, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const NAME: &str = "youtube_agent";

pub fn descriptor() -> ToolDescriptor {
    question_fields(
        ToolDescriptor::new(
            NAME,
            "Answer questions about a YouTube video using transcript and metadata.",
        )
        .action("answer a question about the YouTube video"),
        "Full YouTube video URL.",
        "Question about the referenced video.",
    )
}

/// Metadata reported by `yt-dlp --dump-json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub channel: String,
    pub duration_seconds: Option<u64>,
    pub description: String,
}

impl VideoInfo {
    pub fn from_json(json: &serde_json::Value) -> Self {
        Self {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            channel: json["channel"]
                .as_str()
                .or_else(|| json["uploader"].as_str())
                .unwrap_or("Unknown")
                .to_string(),
            duration_seconds: json["duration"].as_f64().map(|d| d.round() as u64),
            description: json["description"].as_str().unwrap_or_default().to_string(),
        }
    }

    /// "X min Y sec", or "unknown".
    pub fn duration_text(&self) -> String {
        match self.duration_seconds {
            Some(secs) => format!("{} min {} sec", secs / 60, secs % 60),
            None => "unknown".to_string(),
        }
    }
}

pub struct YoutubeAgent {
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
    ytdlp_path: String,
    subtitle_lang: String,
    max_transcript_chars: usize,
    temp_dir: PathBuf,
    video_id_regex: Regex,
    cleaner: SubtitleCleaner,
}

impl YoutubeAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        prompts: Arc<Prompts>,
        settings: &YoutubeSettings,
        temp_dir: PathBuf,
    ) -> Self {
        let video_id_regex = Regex::new(
            r"(?x)
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)
            ([a-zA-Z0-9_-]{11})
        ",
        )
        .expect("Invalid regex");

        Self {
            model,
            prompts,
            ytdlp_path: settings.ytdlp_path.clone(),
            subtitle_lang: settings.subtitle_lang.clone(),
            max_transcript_chars: settings.max_transcript_chars,
            temp_dir,
            video_id_regex,
            cleaner: SubtitleCleaner::new(),
        }
    }

    pub fn extract_video_id(&self, url: &str) -> Option<String> {
        self.video_id_regex
            .captures(url.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<std::process::Output> {
        tokio::process::Command::new(&self.ytdlp_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AgentError::ToolNotFound(self.ytdlp_path.clone())
                } else {
                    AgentError::Tool(format!("Failed to run yt-dlp: {}", e))
                }
            })
    }

    #[instrument(skip(self))]
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo> {
        let output = self
            .run_ytdlp(&["--dump-json", "--skip-download", "--no-warnings", "--no-playlist", url])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("video unavailable") {
                return Err(AgentError::Tool("Video unavailable.".to_string()));
            }
            return Err(AgentError::Tool(format!(
                "yt-dlp could not read {}: {}",
                url,
                stderr.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AgentError::Tool(format!("Failed to parse yt-dlp output: {}", e)))?;
        Ok(VideoInfo::from_json(&json))
    }

    /// Cleaned subtitle text, or `None` when the video has none in the configured language.
    #[instrument(skip(self))]
    async fn fetch_transcript(&self, url: &str, video_id: &str) -> Result<Option<String>> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let work_dir = tempfile::Builder::new()
            .prefix("subs-")
            .tempdir_in(&self.temp_dir)?;
        let template = work_dir.path().join("%(id)s.%(ext)s");
        let template = template.to_string_lossy();

        let output = self
            .run_ytdlp(&[
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                &self.subtitle_lang,
                "--sub-format",
                "vtt/srt/best",
                "--no-warnings",
                "--no-playlist",
                "-o",
                &template,
                url,
            ])
            .await?;

        if !output.status.success() {
            debug!(
                "Subtitle download failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let Some(path) = find_subtitle_file(work_dir.path(), video_id)? else {
            info!("No subtitles available for {}", video_id);
            return Ok(None);
        };

        let raw = tokio::fs::read_to_string(&path).await?;
        let cleaned = self.cleaner.clean(&raw);
        Ok((!cleaned.is_empty()).then_some(cleaned))
    }
}

fn find_subtitle_file(dir: &Path, video_id: &str) -> Result<Option<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            name.starts_with(video_id) && (name.ends_with(".vtt") || name.ends_with(".srt"))
        })
        .collect();
    found.sort();
    Ok(found.into_iter().next())
}

#[async_trait]
impl Capability for YoutubeAgent {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: QuestionArgs = args.parse()?;
        let video_id = self.extract_video_id(&args.url).ok_or_else(|| {
            AgentError::InvalidInput(format!("{} is not a YouTube video URL", args.url))
        })?;

        let info = self.fetch_info(&args.url).await?;
        let transcript = self
            .fetch_transcript(&args.url, &video_id)
            .await?
            .map(|t| truncate_chars(&t, self.max_transcript_chars))
            .unwrap_or_else(|| "Transcript not available.".to_string());

        let mut vars = HashMap::new();
        vars.insert("duration".to_string(), info.duration_text());
        vars.insert("title".to_string(), info.title);
        vars.insert("channel".to_string(), info.channel);
        vars.insert("description".to_string(), info.description);
        vars.insert("transcript".to_string(), transcript);
        vars.insert(
            "chat_history".to_string(),
            format_chat_history(args.chat_history.as_deref()),
        );
        vars.insert("question".to_string(), args.question);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.youtube.template, &vars);
        Ok(model::answer(self.model.as_ref(), prompt).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedModel;
    use serde_json::json;

    fn agent() -> YoutubeAgent {
        YoutubeAgent::new(
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(Prompts::default()),
            &YoutubeSettings::default(),
            std::env::temp_dir(),
        )
    }

    #[test]
    fn test_extract_video_id() {
        let agent = agent();
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://m.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(agent.extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{}", url);
        }
        assert_eq!(agent.extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_video_info_from_json() {
        let info = VideoInfo::from_json(&json!({
            "title": "Intro",
            "uploader": "Chan",
            "duration": 125.0
        }));
        assert_eq!(info.channel, "Chan");
        assert_eq!(info.duration_text(), "2 min 5 sec");
        assert_eq!(VideoInfo::default().duration_text(), "unknown");
    }

    #[test]
    fn test_find_subtitle_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.en.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("other.en.vtt"), "WEBVTT").unwrap();

        let found = find_subtitle_file(dir.path(), "abc").unwrap().unwrap();
        assert!(found.ends_with("abc.en.vtt"));
        assert!(find_subtitle_file(dir.path(), "zzz").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let agent = YoutubeAgent::new(
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(Prompts::default()),
            &YoutubeSettings {
                ytdlp_path: "definitely-not-yt-dlp-here".to_string(),
                ..YoutubeSettings::default()
            },
            std::env::temp_dir(),
        );
        let args = descriptor()
            .input_schema
            .validate(&json!({"url": "https://youtu.be/dQw4w9WgXcQ", "question": "what?"}))
            .unwrap();
        let err = agent.invoke(args).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(_)));
    }
}
