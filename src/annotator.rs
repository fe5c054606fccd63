use crate::{
    bounding_box::BoundingBox, config::AnnotationConfig, font::LabelFont, prediction::Prediction,
};
use image::{DynamicImage, Rgb, RgbImage};

const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Clone)]
pub struct AnnotationStyle {
    pub box_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub stroke_width: u32,
    pub padding_x: u32,
    pub padding_y: u32,
    pub background_alpha: u8,
    pub min_font_size: u32,
    pub font_size_divisor: u32,
}

impl From<&AnnotationConfig> for AnnotationStyle {
    fn from(config: &AnnotationConfig) -> Self {
        Self {
            box_color: Rgb(config.box_color),
            text_color: Rgb(config.text_color),
            stroke_width: config.stroke_width,
            padding_x: config.padding_x,
            padding_y: config.padding_y,
            background_alpha: config.background_alpha,
            min_font_size: config.min_font_size,
            font_size_divisor: config.font_size_divisor,
        }
    }
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self::from(&AnnotationConfig::default())
    }
}

impl AnnotationStyle {
    fn font_size(&self, image_width: u32) -> f32 {
        let scaled = image_width / self.font_size_divisor.max(1);
        self.min_font_size.max(scaled) as f32
    }
}

pub struct Annotator {
    style: AnnotationStyle,
    font: LabelFont,
}

impl Annotator {
    pub fn new(style: AnnotationStyle, font: LabelFont) -> Self {
        Self { style, font }
    }

    pub fn from_config(config: &AnnotationConfig) -> Self {
        let font = LabelFont::resolve(config.font_path.as_deref());
        Self::new(AnnotationStyle::from(config), font)
    }

    /// Draws the prediction's box and label. Without complete geometry the
    /// image comes back unchanged, apart from dropping any alpha channel.
    pub fn annotate(&self, image: &DynamicImage, prediction: &Prediction) -> RgbImage {
        let mut canvas = image.to_rgb8();

        let Some(bbox) = prediction.bounding_box() else {
            tracing::debug!(
                "Prediction {:?} has no complete bounding box, skipping annotation",
                prediction.class_label
            );
            return canvas;
        };

        draw_hollow_rect(
            &mut canvas,
            &bbox,
            self.style.box_color,
            self.style.stroke_width,
        );

        let label = prediction.label();
        let font_size = self.style.font_size(canvas.width());
        let extent = self.font.measure(&label, font_size);

        let bg_x1 = bbox.x1;
        let bg_y1 = bbox.y1.max(0);
        let bg_w = extent
            .width
            .saturating_add(self.style.padding_x.saturating_mul(2));
        let bg_h = extent
            .height
            .saturating_add(self.style.padding_y.saturating_mul(2));

        fill_rect(
            &mut canvas,
            bg_x1,
            bg_y1,
            bg_w,
            bg_h,
            LABEL_BACKGROUND,
            self.style.background_alpha as f32 / 255.,
        );

        self.font.draw(
            &mut canvas,
            &label,
            font_size,
            bg_x1.saturating_add(i32::try_from(self.style.padding_x).unwrap_or(i32::MAX)),
            bg_y1.saturating_add(i32::try_from(self.style.padding_y).unwrap_or(i32::MAX)),
            self.style.text_color,
        );

        tracing::debug!(
            "Annotated {:?} at ({}, {})-({}, {})",
            label,
            bbox.x1,
            bbox.y1,
            bbox.x2,
            bbox.y2
        );

        canvas
    }
}

/// Alpha-blends `color` over the pixel at `(x, y)`; out-of-bounds writes are dropped.
pub(crate) fn blend_pixel(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, alpha: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let alpha = alpha.clamp(0., 1.);
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        *dst = (src as f32 * alpha + *dst as f32 * (1. - alpha)).round() as u8;
    }
}

/// Outline drawn inward: ring `i` is inset by `i` pixels on every side.
/// Each ring is clipped to the canvas before iterating.
fn draw_hollow_rect(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, stroke: u32) {
    let max_x = canvas.width() as i32 - 1;
    let max_y = canvas.height() as i32 - 1;

    for inset in 0..i32::try_from(stroke).unwrap_or(i32::MAX) {
        let left = bbox.x1.saturating_add(inset);
        let top = bbox.y1.saturating_add(inset);
        let right = bbox.x2.saturating_sub(inset);
        let bottom = bbox.y2.saturating_sub(inset);
        if left > right || top > bottom {
            break;
        }
        for x in left.max(0)..=right.min(max_x) {
            blend_pixel(canvas, x, top, color, 1.);
            blend_pixel(canvas, x, bottom, color, 1.);
        }
        for y in top.max(0)..=bottom.min(max_y) {
            blend_pixel(canvas, left, y, color, 1.);
            blend_pixel(canvas, right, y, color, 1.);
        }
    }
}

fn fill_rect(
    canvas: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
    alpha: f32,
) {
    // clip before iterating
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = x
        .saturating_add(i32::try_from(width).unwrap_or(i32::MAX))
        .min(canvas.width() as i32);
    let y_end = y
        .saturating_add(i32::try_from(height).unwrap_or(i32::MAX))
        .min(canvas.height() as i32);

    for py in y_start..y_end {
        for px in x_start..x_end {
            blend_pixel(canvas, px, py, color, alpha);
        }
    }
}
