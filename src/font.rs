use crate::annotator::blend_pixel;
use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_CELL: u32 = 8;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("Failed to read font file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Font file {0} is not a valid TrueType/OpenType font")]
    Invalid(PathBuf),
}

pub enum Typeface {
    TrueType(FontVec),
    Builtin,
}

/// How label extents are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMetrics {
    /// Tight bounds of the rendered glyph outlines.
    GlyphBounds,
    /// Summed advance widths times line height.
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
    // ink origin relative to the layout origin
    offset_x: f32,
    offset_y: f32,
}

pub struct LabelFont {
    typeface: Typeface,
    metrics: TextMetrics,
}

impl LabelFont {
    /// Picks the typeface and measurement strategy once. A missing or broken
    /// font file degrades to the built-in bitmap font.
    pub fn resolve(font_path: Option<&Path>) -> Self {
        let Some(path) = font_path else {
            tracing::debug!("No label font configured, using built-in font");
            return Self::builtin();
        };

        match Self::from_file(path) {
            Ok(font) => {
                tracing::debug!(
                    "Loaded label font {:?} with {:?} metrics",
                    path,
                    font.metrics()
                );
                font
            }
            Err(e) => {
                tracing::warn!("{}, falling back to built-in font", e);
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        Self {
            typeface: Typeface::Builtin,
            metrics: TextMetrics::Advance,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(path.to_path_buf()))?;

        // Fonts without outlines (bitmap-only) cannot report ink bounds.
        let sample = font.glyph_id('A').with_scale(PxScale::from(24.));
        let metrics = if font.outline_glyph(sample).is_some() {
            TextMetrics::GlyphBounds
        } else {
            TextMetrics::Advance
        };

        Ok(Self {
            typeface: Typeface::TrueType(font),
            metrics,
        })
    }

    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    #[cfg(test)]
    fn is_builtin(&self) -> bool {
        matches!(self.typeface, Typeface::Builtin)
    }

    pub fn measure(&self, text: &str, size: f32) -> TextExtent {
        match &self.typeface {
            Typeface::Builtin => {
                let scale = builtin_scale(size);
                TextExtent {
                    width: text.chars().count() as u32 * BUILTIN_CELL * scale,
                    height: BUILTIN_CELL * scale,
                    offset_x: 0.,
                    offset_y: 0.,
                }
            }
            Typeface::TrueType(font) => match self.metrics {
                TextMetrics::GlyphBounds => glyph_bounds(font, text, size),
                TextMetrics::Advance => advance_extent(font, text, size),
            },
        }
    }

    /// Draws `text` so that its measured extent starts at `(x, y)`.
    pub fn draw(
        &self,
        canvas: &mut RgbImage,
        text: &str,
        size: f32,
        x: i32,
        y: i32,
        color: Rgb<u8>,
    ) {
        let extent = self.measure(text, size);
        match &self.typeface {
            Typeface::Builtin => draw_builtin(canvas, text, builtin_scale(size), x, y, color),
            Typeface::TrueType(font) => {
                let origin_x = x as f32 - extent.offset_x;
                let origin_y = y as f32 - extent.offset_y;
                for glyph in layout(font, text, size) {
                    let Some(outlined) = font.outline_glyph(glyph) else {
                        continue;
                    };
                    let bounds = outlined.px_bounds();
                    let left = (origin_x + bounds.min.x).round() as i32;
                    let top = (origin_y + bounds.min.y).round() as i32;
                    outlined.draw(|gx, gy, coverage| {
                        blend_pixel(
                            canvas,
                            left.saturating_add(gx as i32),
                            top.saturating_add(gy as i32),
                            color,
                            coverage,
                        );
                    });
                }
            }
        }
    }
}

fn builtin_scale(size: f32) -> u32 {
    ((size / 12.).round() as u32).max(1)
}

/// Lays glyphs on a single line with the baseline at the font's ascent.
fn layout(font: &FontVec, text: &str, size: f32) -> Vec<Glyph> {
    let scaled = font.as_scaled(PxScale::from(size));
    let mut caret = 0.;
    let mut previous = None;
    let mut glyphs = Vec::with_capacity(text.len());

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scaled.scale(), point(caret, scaled.ascent())));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    glyphs
}

fn glyph_bounds(font: &FontVec, text: &str, size: f32) -> TextExtent {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for glyph in layout(font, text, size) {
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            min_x = min_x.min(bounds.min.x);
            min_y = min_y.min(bounds.min.y);
            max_x = max_x.max(bounds.max.x);
            max_y = max_y.max(bounds.max.y);
        }
    }

    if min_x > max_x {
        // nothing but whitespace
        return TextExtent {
            width: 0,
            height: 0,
            offset_x: 0.,
            offset_y: 0.,
        };
    }

    TextExtent {
        width: (max_x - min_x).ceil() as u32,
        height: (max_y - min_y).ceil() as u32,
        offset_x: min_x,
        offset_y: min_y,
    }
}

fn advance_extent(font: &FontVec, text: &str, size: f32) -> TextExtent {
    let scaled = font.as_scaled(PxScale::from(size));
    let width = layout(font, text, size)
        .last()
        .map(|glyph| glyph.position.x + scaled.h_advance(glyph.id))
        .unwrap_or(0.);

    TextExtent {
        width: width.ceil().max(0.) as u32,
        height: (scaled.ascent() - scaled.descent()).ceil() as u32,
        offset_x: 0.,
        offset_y: 0.,
    }
}

fn builtin_glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_builtin(canvas: &mut RgbImage, text: &str, scale: u32, x: i32, y: i32, color: Rgb<u8>) {
    let cell = (BUILTIN_CELL * scale) as i32;
    let scale = scale as i32;

    for (index, c) in text.chars().enumerate() {
        let cell_x = x.saturating_add((index as i32).saturating_mul(cell));
        for (row, bits) in builtin_glyph(c).iter().enumerate() {
            for col in 0..BUILTIN_CELL as i32 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = cell_x.saturating_add(col * scale);
                let py = y.saturating_add(row as i32 * scale);
                for dy in 0..scale {
                    for dx in 0..scale {
                        blend_pixel(
                            canvas,
                            px.saturating_add(dx),
                            py.saturating_add(dy),
                            color,
                            1.,
                        );
                    }
                }
            }
        }
    }
}
