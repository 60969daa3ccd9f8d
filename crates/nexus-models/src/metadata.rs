//! Publish metadata derived from a script.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::script::Script;

/// Maximum title length accepted by the platform.
pub const MAX_TITLE_CHARS: usize = 100;
/// Maximum description length accepted by the platform.
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
/// Maximum number of tags attached to an upload.
pub const MAX_TAGS: usize = 30;
/// Education.
pub const DEFAULT_CATEGORY_ID: &str = "27";
/// Footer appended to every description.
pub const DESCRIPTION_FOOTER: &str = "#Shorts #YouTube #AI";

/// Upload visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown privacy status: {0}")]
pub struct ParsePrivacyError(String);

impl FromStr for Privacy {
    type Err = ParsePrivacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(ParsePrivacyError(other.to_string())),
        }
    }
}

/// Metadata attached to an uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl VideoMetadata {
    /// Derive bounded metadata from a script.
    pub fn from_script(script: &Script) -> Self {
        Self {
            title: truncate_chars(script.display_title(), MAX_TITLE_CHARS),
            description: build_description(script),
            tags: build_tags(script),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            privacy: Privacy::default(),
            made_for_kids: false,
        }
    }

    /// Override the visibility.
    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }

    /// Override the category.
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = category_id.into();
        self
    }

    /// Request body for the video insert call.
    pub fn to_insert_body(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
                "selfDeclaredMadeForKids": self.made_for_kids,
            }
        })
    }
}

fn build_description(script: &Script) -> String {
    let mut parts = Vec::new();

    let hook = script.hook.trim();
    if !hook.is_empty() {
        parts.push(hook.to_string());
    }

    if !script.key_points.is_empty() {
        parts.push("\nKey points covered:".to_string());
        parts.extend(script.key_points.iter().map(|kp| format!("  - {}", kp.trim())));
    }

    parts.push(format!("\n{}", DESCRIPTION_FOOTER));

    truncate_chars(&parts.join("\n"), MAX_DESCRIPTION_CHARS)
}

fn build_tags(script: &Script) -> Vec<String> {
    let candidates = script
        .sections
        .iter()
        .map(|s| s.title.trim())
        .chain(script.audience())
        .filter(|t| !t.is_empty());

    let mut tags: Vec<String> = Vec::new();
    for tag in candidates {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Section;

    fn script_with_sections(titles: &[&str]) -> Script {
        Script {
            sections: titles
                .iter()
                .map(|t| Section {
                    title: t.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_title_capped() {
        let script = Script {
            selected_topic: Some("x".repeat(150)),
            ..Default::default()
        };
        let meta = VideoMetadata::from_script(&script);
        assert_eq!(meta.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_title_capped_on_char_boundary() {
        let script = Script {
            selected_topic: Some("é".repeat(120)),
            ..Default::default()
        };
        let meta = VideoMetadata::from_script(&script);
        assert_eq!(meta.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_tags_deduplicated_and_capped() {
        let mut titles: Vec<String> = (0..40).map(|i| format!("tag{}", i)).collect();
        titles.insert(1, "tag0".to_string());
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let meta = VideoMetadata::from_script(&script_with_sections(&refs));

        assert_eq!(meta.tags.len(), MAX_TAGS);
        assert_eq!(meta.tags[0], "tag0");
        assert_eq!(meta.tags[1], "tag1");
    }

    #[test]
    fn test_tags_include_audience() {
        let mut script = script_with_sections(&["Mastering", "Stems", "Mastering"]);
        script.target_audience = Some("Producers".to_string());
        let meta = VideoMetadata::from_script(&script);
        assert_eq!(meta.tags, vec!["Mastering", "Stems", "Producers"]);
    }

    #[test]
    fn test_description_layout() {
        let script = Script {
            hook: "Hook line".to_string(),
            key_points: vec!["one".to_string(), "two".to_string()],
            ..Default::default()
        };
        let meta = VideoMetadata::from_script(&script);
        assert!(meta.description.starts_with("Hook line\n"));
        assert!(meta.description.contains("Key points covered:"));
        assert!(meta.description.contains("  - two"));
        assert!(meta.description.ends_with(DESCRIPTION_FOOTER));
    }

    #[test]
    fn test_privacy_defaults_private_and_parses() {
        let meta = VideoMetadata::from_script(&Script::default());
        assert_eq!(meta.privacy, Privacy::Private);
        assert_eq!("Unlisted".parse::<Privacy>().unwrap(), Privacy::Unlisted);
        assert!("secret".parse::<Privacy>().is_err());
    }

    #[test]
    fn test_insert_body_shape() {
        let meta = VideoMetadata::from_script(&script_with_sections(&["A"]))
            .with_privacy(Privacy::Unlisted);
        let body = meta.to_insert_body();
        assert_eq!(body["snippet"]["categoryId"], "27");
        assert_eq!(body["status"]["privacyStatus"], "unlisted");
        assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(body["snippet"]["title"], "A");
    }
}
