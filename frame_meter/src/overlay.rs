//! Burn text labels into frames.
//!
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use thiserror::Error;

/// Font shipped by most Linux distributions.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

/// JPEG quality used when recompressing annotated frames.
pub const JPEG_QUALITY: i32 = 90;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to read font {path}: {source}")]
    FontIo {
        path: String,
        source: std::io::Error,
    },
    #[error("{0} is not a valid TrueType font")]
    InvalidFont(String),
    #[error("jpeg codec error: {0}")]
    Jpeg(#[from] turbojpeg::Error),
}

/// Where and how a label is drawn.
#[derive(Clone, Debug)]
pub struct OverlayStyle {
    /// Top-left corner of the text.
    pub origin: (i32, i32),
    /// Glyph height in pixels.
    pub scale: f32,
    pub colour: Rgb<u8>,
    /// Stroke width in pixels, at least 1.
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            origin: (8, 8),
            scale: 48.0,
            colour: Rgb([0, 255, 0]),
            thickness: 2,
        }
    }
}

/// Load a TrueType font from disk.
pub fn load_font(path: impl AsRef<Path>) -> Result<Font<'static>, OverlayError> {
    let path = path.as_ref();
    let font_data = std::fs::read(path).map_err(|source| OverlayError::FontIo {
        path: path.display().to_string(),
        source,
    })?;

    Font::try_from_vec(font_data)
        .ok_or_else(|| OverlayError::InvalidFont(path.display().to_string()))
}

/// Draw `label` onto the image.
///
/// A thicker stroke is emulated by repeating the text at 1-pixel offsets.
pub fn draw_label(image: &mut RgbImage, font: &Font, style: &OverlayStyle, label: &str) {
    let (x, y) = style.origin;
    let thickness = style.thickness.max(1) as i32;
    let scale = Scale::uniform(style.scale);

    for dx in 0..thickness {
        for dy in 0..thickness {
            draw_text_mut(image, style.colour, x + dx, y + dy, scale, font, label);
        }
    }
}

/// Decompress a JPEG frame, draw `label` and compress it again.
pub fn annotate_jpeg(
    jpeg: &[u8],
    font: &Font,
    style: &OverlayStyle,
    label: &str,
) -> Result<Vec<u8>, OverlayError> {
    let mut image: RgbImage = turbojpeg::decompress_image(jpeg)?;
    draw_label(&mut image, font, style, label);
    let buf = turbojpeg::compress_image(&image, JPEG_QUALITY, turbojpeg::Subsamp::Sub2x2)?;

    Ok(buf.to_vec())
}
