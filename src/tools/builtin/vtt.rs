//! WebVTT/SRT subtitle cleanup into plain paragraphs.

use regex::Regex;

/// Compiled patterns for subtitle cleanup.
pub struct SubtitleCleaner {
    timestamp_line: Regex,
    header: Regex,
    speaker_tag: Regex,
    inline_timestamp: Regex,
    cue_tag: Regex,
    position_only: Regex,
    cue_number: Regex,
}

impl SubtitleCleaner {
    pub fn new() -> Self {
        Self {
            timestamp_line: Regex::new(
                r"^(?:\d{2}:)?\d{2}:\d{2}[.,]\d{3} --> (?:\d{2}:)?\d{2}:\d{2}[.,]\d{3}.*$",
            )
            .expect("Invalid regex"),
            header: Regex::new(r"(?i)^(?:WEBVTT|Kind:|Language:|NOTE(?:\s|$)|STYLE\s*$|REGION\s*$|\s*::cue)")
                .expect("Invalid regex"),
            speaker_tag: Regex::new(r"<v\s+[^>]+>(.*?)</v>|<v\s+[^>]+>").expect("Invalid regex"),
            inline_timestamp: Regex::new(r"<\d{2}:\d{2}:\d{2}[.,]\d{3}>").expect("Invalid regex"),
            cue_tag: Regex::new(r"</?c[^>]*>").expect("Invalid regex"),
            position_only: Regex::new(r"^align:[a-zA-Z]+(?:\s+position:[\d%]+)?$")
                .expect("Invalid regex"),
            cue_number: Regex::new(r"^\d+$").expect("Invalid regex"),
        }
    }

    /// Strip timing, tags and consecutive repeats. Blank lines separate paragraphs.
    pub fn clean(&self, raw: &str) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut previous: Option<String> = None;

        for line in raw.lines() {
            if self.timestamp_line.is_match(line) || self.header.is_match(line) {
                continue;
            }

            let line = self.speaker_tag.replace_all(line, "$1");
            let line = self.inline_timestamp.replace_all(&line, "");
            let line = self.cue_tag.replace_all(&line, "");
            let line = line.trim();

            if self.position_only.is_match(line) || self.cue_number.is_match(line) {
                continue;
            }

            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
                continue;
            }

            if previous.as_deref() == Some(line) {
                continue;
            }

            // Auto-generated captions repeat the previous line as the prefix of the next.
            if let Some(last) = current.last() {
                if line.starts_with(last.as_str()) {
                    let extended = line.to_string();
                    current.pop();
                    current.push(extended);
                    previous = Some(line.to_string());
                    continue;
                }
            }

            current.push(line.to_string());
            previous = Some(line.to_string());
        }

        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }

        paragraphs
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
    }
}

impl Default for SubtitleCleaner {
    fn default() -> Self {
        Self::new()
    }
}
