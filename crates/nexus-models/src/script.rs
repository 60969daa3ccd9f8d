//! Script record produced by the script-writing collaborator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::TargetSpec;

/// Title used when the script carries neither a topic nor section captions.
pub const DEFAULT_TITLE: &str = "Untitled Video";

/// Narration pace used to estimate section length when none is given.
pub const NARRATION_WORDS_PER_SECOND: f64 = 2.5;

/// Shortest target duration a section is ever given.
pub const MIN_SECTION_SECONDS: f64 = 3.0;

/// A structured video script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Working title from the script writer
    #[serde(default)]
    pub title: String,

    /// Opening narration line
    #[serde(default)]
    pub hook: String,

    /// Ordered body sections
    #[serde(default)]
    pub sections: Vec<Section>,

    /// Call-to-action narration closing the video
    #[serde(default)]
    pub cta: String,

    /// Topic chosen during research; preferred display title when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_topic: Option<String>,

    /// Intended audience, used as an extra tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,

    /// Bullet points summarized in the description
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,

    /// Writer-suggested description (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Writer-suggested tags (informational)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Writer's estimate of the total runtime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_estimate: Option<f64>,
}

/// One body section of a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// On-screen caption for the section
    #[serde(default)]
    pub title: String,

    /// Narration text
    #[serde(default)]
    pub content: String,

    /// Stock-footage search cue
    #[serde(default, alias = "visual", alias = "search_query")]
    pub visual_cue: Option<String>,

    /// Explicit section length in seconds
    #[serde(default, alias = "duration_estimate")]
    pub duration: Option<f64>,
}

impl Section {
    /// Target duration for this section's rendered clip.
    ///
    /// Uses the explicit duration when positive, otherwise estimates from the
    /// narration word count.
    pub fn target_duration(&self) -> f64 {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => {
                let words = self.content.split_whitespace().count() as f64;
                (words / NARRATION_WORDS_PER_SECOND).max(MIN_SECTION_SECONDS)
            }
        }
    }
}

impl Script {
    /// Parse a script from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Topic, if one was set and is not blank.
    pub fn topic(&self) -> Option<&str> {
        non_blank(self.selected_topic.as_deref())
    }

    /// Target audience, if one was set and is not blank.
    pub fn audience(&self) -> Option<&str> {
        non_blank(self.target_audience.as_deref())
    }

    /// Caption of the first section, if any.
    pub fn first_caption(&self) -> Option<&str> {
        self.sections
            .first()
            .and_then(|s| non_blank(Some(s.title.as_str())))
    }

    /// Display title: topic, then first section caption, then a fixed default.
    pub fn display_title(&self) -> &str {
        self.topic()
            .or_else(|| self.first_caption())
            .unwrap_or(DEFAULT_TITLE)
    }

    /// Rendering targets for every section, in script order.
    pub fn target_specs(&self) -> Vec<TargetSpec> {
        self.sections
            .iter()
            .enumerate()
            .map(|(index, section)| TargetSpec {
                index,
                duration: section.target_duration(),
                caption: section.title.trim().to_string(),
            })
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Raw footage per section index, as delivered by the footage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FootageManifest(pub BTreeMap<usize, Vec<PathBuf>>);

impl FootageManifest {
    /// Parse a manifest from JSON text (`{"0": ["a.mp4", ...], ...}`).
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Clips for a section; empty when the section has no entry.
    pub fn clips_for(&self, index: usize) -> &[PathBuf] {
        self.0.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register clips for a section.
    pub fn insert(&mut self, index: usize, clips: Vec<PathBuf>) {
        self.0.insert(index, clips);
    }

    /// Resolve relative clip paths against a base directory.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        for clips in self.0.values_mut() {
            for clip in clips.iter_mut() {
                if clip.is_relative() {
                    *clip = base.join(&*clip);
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, content: &str) -> Section {
        Section {
            title: title.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_title_priority() {
        let mut script = Script {
            selected_topic: Some("Quantum batteries".to_string()),
            sections: vec![section("Intro to cells", "")],
            ..Default::default()
        };
        assert_eq!(script.display_title(), "Quantum batteries");

        script.selected_topic = Some("   ".to_string());
        assert_eq!(script.display_title(), "Intro to cells");

        script.sections.clear();
        assert_eq!(script.display_title(), DEFAULT_TITLE);
    }

    #[test]
    fn test_target_duration_explicit_and_estimated() {
        let mut s = section("a", "one two three four five six seven eight nine ten");
        s.duration = Some(7.5);
        assert!((s.target_duration() - 7.5).abs() < 1e-9);

        s.duration = None;
        // 10 words at 2.5 wps = 4s
        assert!((s.target_duration() - 4.0).abs() < 1e-9);

        s.content = "short".to_string();
        assert!((s.target_duration() - MIN_SECTION_SECONDS).abs() < 1e-9);

        s.duration = Some(-1.0);
        assert!((s.target_duration() - MIN_SECTION_SECONDS).abs() < 1e-9);
    }

    #[test]
    fn test_parse_script_json() {
        let json = r#"{
            "title": "AI in music",
            "hook": "What if your next hit was co-written by a machine?",
            "sections": [
                {"title": "Mastering", "content": "AI mastering...", "visual": "studio", "duration": 10},
                {"title": "Stems", "content": "Stem separation..."}
            ],
            "cta": "Subscribe!",
            "target_audience": "Producers"
        }"#;
        let script = Script::from_json(json).unwrap();
        assert_eq!(script.sections.len(), 2);
        assert_eq!(script.sections[0].visual_cue.as_deref(), Some("studio"));
        assert_eq!(script.audience(), Some("Producers"));
        assert!(script.topic().is_none());

        let specs = script.target_specs();
        assert_eq!(specs[0].index, 0);
        assert!((specs[0].duration - 10.0).abs() < 1e-9);
        assert_eq!(specs[1].caption, "Stems");
    }

    #[test]
    fn test_footage_manifest() {
        let manifest = FootageManifest::from_json(r#"{"0": ["a.mp4", "/abs/b.mp4"], "2": []}"#)
            .unwrap()
            .resolve_relative_to(Path::new("/footage"));

        assert_eq!(
            manifest.clips_for(0),
            &[PathBuf::from("/footage/a.mp4"), PathBuf::from("/abs/b.mp4")]
        );
        assert!(manifest.clips_for(1).is_empty());
        assert!(manifest.clips_for(2).is_empty());
    }
}
