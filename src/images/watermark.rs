use std::fs;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;

/// Default text burned into listing images.
pub const DEFAULT_WATERMARK_TEXT: &str = "INFOESCORT.CL";

/// Share of the shorter image side used as text height.
const TEXT_HEIGHT_RATIO: f32 = 0.07;
const MIN_TEXT_HEIGHT: f32 = 12.0;
const MARGIN_RATIO: f32 = 0.03;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("invalid watermark font")]
    InvalidFont,
}

/// Visible mark applied to a stored image, overwriting the file in place.
pub trait Watermark {
    fn apply(&self, path: &Path) -> Result<(), WatermarkError>;
}

/// Text watermark drawn in the lower right corner with a dark shadow.
#[derive(Clone)]
pub struct TextWatermark {
    text: String,
    font: FontArc,
}

impl TextWatermark {
    pub fn new(text: impl Into<String>, font: FontArc) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }

    /// Load the TrueType/OpenType font at `font_path`.
    pub fn from_font_file(
        text: impl Into<String>,
        font_path: &Path,
    ) -> Result<Self, WatermarkError> {
        let bytes = fs::read(font_path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|_| WatermarkError::InvalidFont)?;
        Ok(Self::new(text, font))
    }
}

impl Watermark for TextWatermark {
    fn apply(&self, path: &Path) -> Result<(), WatermarkError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().ok_or(WatermarkError::UnsupportedFormat)?;
        let image = reader.decode()?;

        let mut canvas = image.to_rgba8();
        let (width, height) = canvas.dimensions();

        let scale = PxScale::from(text_height(width, height));
        let (text_width, text_height) = text_size(scale, &self.font, &self.text);
        let (x, y) = text_position(width, height, text_width, text_height);
        let shadow_offset = ((scale.y / 16.0).ceil() as i32).max(1);

        draw_text_mut(
            &mut canvas,
            Rgba([0, 0, 0, 255]),
            x + shadow_offset,
            y + shadow_offset,
            scale,
            &self.font,
            &self.text,
        );
        draw_text_mut(
            &mut canvas,
            Rgba([255, 255, 255, 255]),
            x,
            y,
            scale,
            &self.font,
            &self.text,
        );

        let output = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
            ImageFormat::Png | ImageFormat::Gif => DynamicImage::ImageRgba8(canvas),
            _ => return Err(WatermarkError::UnsupportedFormat),
        };
        output.save_with_format(path, format)?;

        Ok(())
    }
}

fn text_height(width: u32, height: u32) -> f32 {
    (width.min(height) as f32 * TEXT_HEIGHT_RATIO).max(MIN_TEXT_HEIGHT)
}

/// Top-left corner of a `text_width` x `text_height` box placed in the lower
/// right corner, clamped so it never starts outside the image.
fn text_position(width: u32, height: u32, text_width: u32, text_height: u32) -> (i32, i32) {
    let margin = (width.min(height) as f32 * MARGIN_RATIO).round() as i64;
    let x = (width as i64 - text_width as i64 - margin).max(0);
    let y = (height as i64 - text_height as i64 - margin).max(0);
    (x as i32, y as i32)
}
