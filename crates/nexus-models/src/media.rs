//! Media artifacts flowing through the render stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One stock-footage file with its probed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClip {
    pub path: PathBuf,
    /// Probed duration in seconds; zero when unknown
    pub duration: f64,
}

impl RawClip {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    /// Whether this clip can contribute any footage.
    pub fn is_usable(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// Rendering goal for one script section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Section index, used for output naming
    pub index: usize,
    /// Target duration in seconds (> 0)
    pub duration: f64,
    /// Caption burned into the clip
    pub caption: String,
}

/// A rendered, duration-exact, captioned section segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionClip {
    pub path: PathBuf,
    pub duration: f64,
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Always true: section clips carry no audio track
    pub silent: bool,
}

/// A rendered intro/outro card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slate {
    pub path: PathBuf,
    pub duration: f64,
    pub caption: String,
}

/// Ordered concatenation plan: intro, section clips, outro.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub intro: Slate,
    pub sections: Vec<SectionClip>,
    pub outro: Slate,
}

impl Timeline {
    /// Segment paths in strict append order.
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.intro.path.clone())
            .chain(self.sections.iter().map(|s| s.path.clone()))
            .chain(std::iter::once(self.outro.path.clone()))
            .collect()
    }

    /// Playable duration: intro + all sections + outro.
    pub fn duration(&self) -> f64 {
        self.intro.duration
            + self.sections.iter().map(|s| s.duration).sum::<f64>()
            + self.outro.duration
    }

    /// Number of segments including both slates.
    pub fn len(&self) -> usize {
        self.sections.len() + 2
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Narration input owned by the audio collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: f64,
}

/// The publish-ready artifact of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    pub path: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub video_codec: String,
    pub audio_codec: String,
}

/// A rendered thumbnail still.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub path: PathBuf,
    /// Title the thumbnail was rendered from
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slate(name: &str, duration: f64) -> Slate {
        Slate {
            path: PathBuf::from(name),
            duration,
            caption: name.to_string(),
        }
    }

    fn clip(name: &str, index: usize, duration: f64) -> SectionClip {
        SectionClip {
            path: PathBuf::from(name),
            duration,
            index,
            width: 1920,
            height: 1080,
            silent: true,
        }
    }

    #[test]
    fn test_timeline_order_and_duration() {
        let timeline = Timeline {
            intro: slate("intro.mp4", 2.0),
            sections: vec![clip("s0.mp4", 0, 4.0), clip("s1.mp4", 1, 3.5)],
            outro: slate("outro.mp4", 3.0),
        };

        assert_eq!(
            timeline.segment_paths(),
            vec![
                PathBuf::from("intro.mp4"),
                PathBuf::from("s0.mp4"),
                PathBuf::from("s1.mp4"),
                PathBuf::from("outro.mp4"),
            ]
        );
        assert!((timeline.duration() - 12.5).abs() < 1e-9);
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn test_raw_clip_usable() {
        assert!(RawClip::new("a.mp4", 2.0).is_usable());
        assert!(!RawClip::new("b.mp4", 0.0).is_usable());
        assert!(!RawClip::new("c.mp4", f64::NAN).is_usable());
    }
}
