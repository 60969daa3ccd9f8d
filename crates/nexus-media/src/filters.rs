//! FFmpeg filter builders shared by the render components.

use std::path::{Path, PathBuf};

/// Bottom-left caption anchor for section clips (pixels from the left edge).
pub const CAPTION_OFFSET_X: u32 = 60;
/// Bottom-left caption anchor for section clips (pixels above the bottom edge).
pub const CAPTION_OFFSET_Y: u32 = 80;

/// Scale into a `width`x`height` frame preserving aspect ratio, padding the rest.
pub fn scale_pad(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1",
        w = width,
        h = height
    )
}

/// Normalize frame rate and pixel format so segments concatenate cleanly.
pub fn normalize(fps: u32) -> String {
    format!("fps={},format=yuv420p", fps)
}

/// Where a caption sits in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionAnchor {
    /// Fixed offset from the bottom-left corner.
    BottomLeft { x: u32, y: u32 },
    /// Centered on both axes.
    Center,
}

impl CaptionAnchor {
    fn position(&self) -> (String, String) {
        match self {
            CaptionAnchor::BottomLeft { x, y } => (x.to_string(), format!("h-text_h-{}", y)),
            CaptionAnchor::Center => ("(w-text_w)/2".to_string(), "(h-text_h)/2".to_string()),
        }
    }
}

/// Visual style of a burned-in caption.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    pub font_color: String,
    /// Text opacity, 0.0..=1.0
    pub opacity: f32,
    pub border_width: u32,
    pub border_color: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: 54,
            font_color: "white".to_string(),
            opacity: 0.85,
            border_width: 3,
            border_color: "black".to_string(),
        }
    }
}

impl CaptionStyle {
    /// Style used on slates: larger, fully opaque.
    pub fn slate() -> Self {
        Self {
            font_size: 72,
            opacity: 1.0,
            ..Default::default()
        }
    }

    pub fn with_font_file(mut self, font_file: Option<PathBuf>) -> Self {
        self.font_file = font_file;
        self
    }

    /// Build a `drawtext` filter for `text` at `anchor`.
    pub fn drawtext(&self, text: &str, anchor: CaptionAnchor) -> String {
        let (x, y) = anchor.position();
        let mut filter = String::from("drawtext=");

        if let Some(font) = &self.font_file {
            filter.push_str(&format!("fontfile={}:", escape_filter_path(font)));
        }

        filter.push_str(&format!(
            "text={text}:expansion=none:fontsize={size}:fontcolor={color}@{alpha:.2}:\
             borderw={bw}:bordercolor={bc}:x={x}:y={y}",
            text = escape_drawtext(text),
            size = self.font_size,
            color = self.font_color,
            alpha = self.opacity.clamp(0.0, 1.0),
            bw = self.border_width,
            bc = self.border_color,
        ));

        filter
    }
}

/// Escape caption text for a `drawtext` value inside a filtergraph.
///
/// Two passes: once for the option parser, once for the graph parser.
pub fn escape_drawtext(text: &str) -> String {
    let flat: String = text
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    escape_chars(&escape_chars(&flat, &['\\', '\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

/// Escape a filesystem path used as a filter option value.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    escape_chars(&escape_chars(&normalized, &['\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(s: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        if special.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Render a concat-demuxer list file body.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let s = p.to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", s)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_pad() {
        let f = scale_pad(1920, 1080);
        assert!(f.starts_with("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(f.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("plain text"), "plain text");
        // ':' -> '\:' (option level) -> '\\:' (graph level)
        assert_eq!(escape_drawtext("5:00"), "5\\\\:00");
        assert_eq!(escape_drawtext("it's"), "it\\\\\\'s");
        assert_eq!(escape_drawtext("a,b"), "a\\,b");
        assert_eq!(escape_drawtext("line\nbreak"), "line break");
    }

    #[test]
    fn test_drawtext_bottom_left() {
        let f = CaptionStyle::default().drawtext(
            "Hello",
            CaptionAnchor::BottomLeft {
                x: CAPTION_OFFSET_X,
                y: CAPTION_OFFSET_Y,
            },
        );
        assert!(f.starts_with("drawtext=text=Hello"));
        assert!(f.contains("x=60:y=h-text_h-80"));
        assert!(f.contains("fontcolor=white@0.85"));
        assert!(f.contains("borderw=3:bordercolor=black"));
        assert!(!f.contains("fontfile"));
    }

    #[test]
    fn test_drawtext_centered_with_font() {
        let f = CaptionStyle::slate()
            .with_font_file(Some(PathBuf::from("/fonts/Bold.ttf")))
            .drawtext("NEXUS", CaptionAnchor::Center);
        assert!(f.contains("fontfile=/fonts/Bold.ttf:"));
        assert!(f.contains("x=(w-text_w)/2:y=(h-text_h)/2"));
        assert!(f.contains("@1.00"));
    }

    #[test]
    fn test_concat_list_quotes() {
        let body = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(body, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }
}
