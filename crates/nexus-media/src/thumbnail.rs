//! Title thumbnail compositing.
//!
//! Deterministic for a given title and font: a vertical gradient, the title
//! wrapped and centered as a block with a drop shadow, and an accent bar
//! along the bottom edge.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use nexus_models::encoding::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use nexus_models::{Script, Thumbnail};

use crate::error::MediaResult;

pub const GRADIENT_TOP: Rgb<u8> = Rgb([0x1A, 0x2A, 0x6C]);
pub const GRADIENT_BOTTOM: Rgb<u8> = Rgb([0x0B, 0x0B, 0x12]);
pub const ACCENT_COLOR: Rgb<u8> = Rgb([0xE5, 0x2D, 0x27]);
pub const ACCENT_HEIGHT: u32 = 14;
pub const TEXT_COLOR: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);
pub const SHADOW_COLOR: Rgb<u8> = Rgb([0x00, 0x00, 0x00]);
pub const SHADOW_OFFSET: i32 = 4;
pub const FONT_SIZE: f32 = 80.0;
pub const LINE_HEIGHT: u32 = 96;
pub const MAX_LINE_CHARS: usize = 20;
pub const MAX_LINES: usize = 7;
pub const JPEG_QUALITY: u8 = 90;

const ELLIPSIS: char = '…';

/// Bold faces first, then regular ones.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(font = %path.display(), "Unusable font file: {}", e);
            None
        }
    }
}

/// Locate a font: the explicit file, then the system candidates.
pub fn resolve_font(explicit: Option<&Path>) -> Option<(PathBuf, FontVec)> {
    explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
        .find_map(|path| load_font(&path).map(|font| (path, font)))
}

/// Greedy word wrap bounded by `max_chars` per line and `max_lines` lines.
///
/// Words longer than a line are hard-split. When lines are dropped the last
/// kept line ends in an ellipsis.
pub fn wrap_title(title: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    if max_chars == 0 || max_lines == 0 {
        return Vec::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in title.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            let piece: String = piece.iter().collect();
            let current_len = current.chars().count();
            let piece_len = piece.chars().count();

            if current.is_empty() {
                current = piece;
            } else if current_len + 1 + piece_len <= max_chars {
                current.push(' ');
                current.push_str(&piece);
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let mut kept: String = last.chars().take(max_chars - 1).collect();
            kept.truncate(kept.trim_end().len());
            kept.push(ELLIPSIS);
            *last = kept;
        }
    }

    lines
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

/// Renders title thumbnails.
pub struct ThumbnailCompositor {
    font: Option<FontVec>,
    width: u32,
    height: u32,
}

impl ThumbnailCompositor {
    /// Build a compositor, resolving a font from `font_file` or the system.
    pub fn new(font_file: Option<&Path>) -> Self {
        let font = match resolve_font(font_file) {
            Some((path, font)) => {
                debug!(font = %path.display(), "Thumbnail font resolved");
                Some(font)
            }
            None => {
                warn!("No TrueType font found, thumbnails will carry no title text");
                None
            }
        };
        Self::with_font(font)
    }

    pub fn with_font(font: Option<FontVec>) -> Self {
        Self {
            font,
            width: THUMBNAIL_WIDTH,
            height: THUMBNAIL_HEIGHT,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_gradient(&self, canvas: &mut RgbImage) {
        let span = self.height.saturating_sub(1).max(1) as f32;
        for y in 0..self.height {
            let t = y as f32 / span;
            let color = Rgb([
                lerp(GRADIENT_TOP[0], GRADIENT_BOTTOM[0], t),
                lerp(GRADIENT_TOP[1], GRADIENT_BOTTOM[1], t),
                lerp(GRADIENT_TOP[2], GRADIENT_BOTTOM[2], t),
            ]);
            for x in 0..self.width {
                canvas.put_pixel(x, y, color);
            }
        }
    }

    fn draw_title(&self, canvas: &mut RgbImage, font: &FontVec, lines: &[String]) {
        let scale = PxScale::from(FONT_SIZE);
        let block = lines.len() as u32 * LINE_HEIGHT;
        let top = self.height.saturating_sub(block) as i32 / 2;

        for (i, line) in lines.iter().enumerate() {
            let (line_width, _) = text_size(scale, font, line);
            let x = (self.width as i32 - line_width as i32) / 2;
            let y = top + (i as u32 * LINE_HEIGHT) as i32;

            draw_text_mut(
                canvas,
                SHADOW_COLOR,
                x + SHADOW_OFFSET,
                y + SHADOW_OFFSET,
                scale,
                font,
                line,
            );
            draw_text_mut(canvas, TEXT_COLOR, x, y, scale, font, line);
        }
    }

    /// Render `title` onto a fresh canvas.
    pub fn render(&self, title: &str) -> RgbImage {
        let mut canvas = RgbImage::new(self.width, self.height);
        self.draw_gradient(&mut canvas);

        if let Some(font) = &self.font {
            let lines = wrap_title(title, MAX_LINE_CHARS, MAX_LINES);
            self.draw_title(&mut canvas, font, &lines);
        }

        let bar = Rect::at(0, (self.height - ACCENT_HEIGHT) as i32)
            .of_size(self.width, ACCENT_HEIGHT);
        draw_filled_rect_mut(&mut canvas, bar, ACCENT_COLOR);

        canvas
    }

    /// Render the script's display title and write it as JPEG to `output`.
    pub fn compose(&self, script: &Script, output: &Path) -> MediaResult<Thumbnail> {
        let title = script.display_title().to_string();
        let canvas = self.render(&title);

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(output)?);
        JpegEncoder::new_with_quality(writer, JPEG_QUALITY).encode_image(&canvas)?;

        info!(output = %output.display(), title = %title, "Thumbnail written");
        Ok(Thumbnail {
            path: output.to_path_buf(),
            title,
        })
    }
}
