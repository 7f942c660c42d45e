//! Pixel buffer that strokes are rasterized into.
//!
//! The buffer is sized once, when the canvas is first laid out. Every
//! operation is a no-op until then.

use base64::Engine as _;
use egui::{Color32, Pos2, Rect};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _, Rgba, RgbaImage};
use thiserror::Error;

use crate::input::StrokeSink;
use crate::utils::AppUtils;

/// Stroke width in canvas pixels.
pub const LINE_WIDTH: f32 = 3.0;

// Spacing between brush stamps along a segment, in pixels.
const STAMP_SPACING: f32 = 0.5;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCap {
    Round,
}

/// What the shell paints behind the buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Background {
    #[default]
    Blank,
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Jpeg,
    Png,
}

impl ExportFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// An encoded still of the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>` form accepted by the recognition service.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub struct Surface {
    buffer: Option<RgbaImage>,
    line_width: f32,
    line_cap: LineCap,
    background: Background,
    pen: Option<Pos2>, // 当前笔画的上一个点
    revision: u64,     // 像素变化计数，用于纹理刷新
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            buffer: None,
            line_width: LINE_WIDTH,
            line_cap: LineCap::Round,
            background: Background::Blank,
            pen: None,
            revision: 0,
        }
    }
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the buffer to the viewport minus the space above the canvas.
    ///
    /// Only the first call has an effect; resizing mid-session is unsupported.
    pub fn initialize(&mut self, viewport_width: u32, viewport_height: u32, top_offset: u32) {
        if self.buffer.is_some() {
            log::warn!("surface already initialized, ignoring resize");
            return;
        }

        let height = viewport_height.saturating_sub(top_offset);
        log::debug!("surface initialized at {viewport_width}x{height}");
        self.buffer = Some(RgbaImage::new(viewport_width, height));
        self.line_cap = LineCap::Round;
        self.line_width = LINE_WIDTH;
        self.revision += 1;
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.buffer.as_ref().map(RgbaImage::dimensions)
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn line_cap(&self) -> LineCap {
        self.line_cap
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.buffer.as_ref()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.buffer
            .as_ref()
            .and_then(|buffer| buffer.get_pixel_checked(x, y))
            .copied()
    }

    pub fn contains(&self, point: Pos2) -> bool {
        self.size().is_some_and(|(width, height)| {
            point.x >= 0.0 && point.y >= 0.0 && point.x < width as f32 && point.y < height as f32
        })
    }

    /// Starts a stroke at `point`. The first stroke arms the black background.
    pub fn begin_stroke(&mut self, point: Pos2) {
        if self.buffer.is_none() {
            return;
        }
        self.pen = Some(point);
        self.background = Background::Black;
    }

    /// Draws a segment from the last recorded point to `point`.
    pub fn extend_stroke(&mut self, point: Pos2, color: Color32) {
        let (Some(buffer), Some(from)) = (self.buffer.as_mut(), self.pen) else {
            return;
        };

        if !point.is_finite() {
            log::debug!("ignoring non-finite stroke point {point:?}");
            return;
        }

        let (width, height) = buffer.dimensions();
        let paint = Rgba(color.to_srgba_unmultiplied());
        let radius = self.line_width / 2.0;

        // Only the part of the segment whose stamps can reach the buffer is sampled.
        let bounds = Rect::from_min_max(Pos2::ZERO, Pos2::new(width as f32, height as f32))
            .expand(radius);
        if let Some((start, end)) = AppUtils::clip_segment(from, point, bounds) {
            for center in AppUtils::segment_samples(start, end, STAMP_SPACING) {
                for (x, y) in AppUtils::disc_pixels(center, radius, width, height) {
                    if let Some(pixel) = buffer.get_pixel_mut_checked(x, y) {
                        *pixel = paint;
                    }
                }
            }
        }

        self.pen = Some(point);
        self.revision += 1;
    }

    pub fn end_stroke(&mut self) {
        self.pen = None;
    }

    pub fn is_stroking(&self) -> bool {
        self.pen.is_some()
    }

    /// Erases every pixel. Dimensions and background are left alone.
    pub fn clear(&mut self) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        buffer.pixels_mut().for_each(|pixel| *pixel = TRANSPARENT);
        self.revision += 1;
    }

    /// Encodes the current buffer.
    ///
    /// `quality` is a fraction in `[0, 1]` and only affects JPEG. Transparent
    /// pixels are flattened onto black for JPEG. Returns `Ok(None)` before the
    /// surface is initialized.
    ///
    /// # Errors
    /// Returns [`SurfaceError::Encode`] when the encoder rejects the buffer.
    pub fn export_image(
        &self,
        format: ExportFormat,
        quality: f32,
    ) -> Result<Option<EncodedImage>, SurfaceError> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Ok(None);
        };

        let (width, height) = buffer.dimensions();
        let mut bytes = Vec::new();
        match format {
            ExportFormat::Jpeg => {
                let rgb: Vec<u8> = buffer
                    .pixels()
                    .flat_map(|pixel| AppUtils::flatten_on_black(pixel.0))
                    .collect();
                JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality)).encode(
                    &rgb,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            }
            ExportFormat::Png => {
                PngEncoder::new(&mut bytes).write_image(
                    buffer.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
            }
        }

        log::debug!(
            "exported {width}x{height} {} ({} bytes)",
            format.mime_type(),
            bytes.len()
        );
        Ok(Some(EncodedImage {
            format,
            width,
            height,
            bytes,
        }))
    }
}

impl StrokeSink for Surface {
    fn contains(&self, point: Pos2) -> bool {
        Self::contains(self, point)
    }

    fn begin_stroke(&mut self, point: Pos2) {
        Self::begin_stroke(self, point);
    }

    fn extend_stroke(&mut self, point: Pos2, color: Color32) {
        Self::extend_stroke(self, point, color);
    }

    fn end_stroke(&mut self) {
        Self::end_stroke(self);
    }
}

fn jpeg_quality(fraction: f32) -> u8 {
    if fraction.is_nan() {
        return 1;
    }
    ((fraction.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
}
