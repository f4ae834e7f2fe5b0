//! Image transform: photo in, panel-ready 1-bit frame out.
//!
//! The pipeline runs in a fixed order:
//! 1. decode and apply the EXIF orientation
//! 2. convert to RGB
//! 3. resize to fit the panel, keeping the aspect ratio (Lanczos3)
//! 4. contrast enhancement
//! 5. grayscale (Rec.601 weights)
//! 6. Floyd-Steinberg dither to black/white
//! 7. paste centered on a white canvas of exactly the panel size
//! 8. optional black border, drawn last
//!
//! Everything after decoding is a pure function of the pixels and the
//! options, so the same photo always produces the same bitmap.

use crate::config::ImageProcessingConfig;
use crate::{Bitmap, DisplayGeometry};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, ascii};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyleBuilder, Rectangle, StrokeAlignment};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use image::imageops::{self, BiLevel, FilterType};
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Luma, RgbImage};
use std::path::Path;
use tracing::Span;

/// Used for status text when the configured font name is unknown.
pub const FALLBACK_FONT: &MonoFont<'static> = &ascii::FONT_6X10;

/// Look up one of the built-in monospace fonts by name ("10x20", "9x15_bold", ...).
pub fn font_by_name(name: &str) -> Option<&'static MonoFont<'static>> {
    let font = match name.trim().to_ascii_lowercase().as_str() {
        "6x10" => &ascii::FONT_6X10,
        "6x13" => &ascii::FONT_6X13,
        "6x13_bold" => &ascii::FONT_6X13_BOLD,
        "7x13" => &ascii::FONT_7X13,
        "7x13_bold" => &ascii::FONT_7X13_BOLD,
        "8x13" => &ascii::FONT_8X13,
        "8x13_bold" => &ascii::FONT_8X13_BOLD,
        "9x15" => &ascii::FONT_9X15,
        "9x15_bold" => &ascii::FONT_9X15_BOLD,
        "9x18" => &ascii::FONT_9X18,
        "9x18_bold" => &ascii::FONT_9X18_BOLD,
        "10x20" => &ascii::FONT_10X20,
        _ => return None,
    };
    Some(font)
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct TransformOptions {
    /// Contrast multiplier, 1.0 leaves the image untouched.
    pub contrast: f32,
    /// Border thickness in pixels; `None` or `Some(0)` draws nothing.
    pub border_width: Option<u32>,
    /// Preferred font for [`ImageTransform::render_text`].
    pub font: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::from(&ImageProcessingConfig::default())
    }
}

impl From<&ImageProcessingConfig> for TransformOptions {
    fn from(config: &ImageProcessingConfig) -> Self {
        Self {
            contrast: config.contrast_enhancement,
            border_width: config.border.then_some(config.border_width),
            font: config.font.clone(),
        }
    }
}

// ── Pipeline steps ───────────────────────────────────────────────────

/// Largest size with the source's aspect ratio that fits the panel.
///
/// The fitted side matches the panel exactly; the other side is floored,
/// and never drops below one pixel. An empty panel fits nothing.
pub fn fit_size(src_width: u32, src_height: u32, geometry: DisplayGeometry) -> (u32, u32) {
    if geometry.is_empty() {
        return (0, 0);
    }
    let img_ratio = src_width.max(1) as f64 / src_height.max(1) as f64;
    if img_ratio > geometry.aspect_ratio() {
        let height = (geometry.width as f64 / img_ratio) as u32;
        (geometry.width, height.clamp(1, geometry.height))
    } else {
        let width = (geometry.height as f64 * img_ratio) as u32;
        (width.clamp(1, geometry.width), geometry.height)
    }
}

/// Top-left position that centers an image of `size` on the panel.
///
/// Odd leftovers are floored, so the image sits one pixel toward the top-left.
pub fn center_offset(size: (u32, u32), geometry: DisplayGeometry) -> (u32, u32) {
    (
        geometry.width.saturating_sub(size.0) / 2,
        geometry.height.saturating_sub(size.1) / 2,
    )
}

/// Rec.601 luma (0.299 R + 0.587 G + 0.114 B) in 16-bit fixed point.
///
/// `imageops::grayscale` uses Rec.709 weights, which renders saturated
/// reds and blues darker than photo tools that follow ITU-R 601.
pub fn luma601(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Scale each channel's distance from the mean gray level by `factor`.
pub fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    if factor == 1.0 {
        return img.clone();
    }

    let gray = luma601(img);
    let pixel_count = gray.as_raw().len().max(1) as f64;
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    let mean = (sum as f64 / pixel_count + 0.5).floor() as f32;

    let mut result = img.clone();
    for pixel in result.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = mean + factor * (*channel as f32 - mean);
            *channel = value.clamp(0.0, 255.0) as u8;
        }
    }
    result
}

/// Grayscale, then error-diffuse down to pure black and white.
pub fn dither_to_bilevel(img: &RgbImage) -> GrayImage {
    let mut gray = luma601(img);
    imageops::dither(&mut gray, &BiLevel);
    gray
}

/// Paint a black frame `width` pixels thick along the inside of the canvas edge.
pub fn draw_border(canvas: &mut Bitmap, width: u32) {
    if width == 0 {
        return;
    }
    let style = PrimitiveStyleBuilder::new()
        .stroke_color(BinaryColor::On)
        .stroke_width(width)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    let Ok(()) = Rectangle::new(Point::zero(), canvas.size())
        .into_styled(style)
        .draw(canvas);
}

/// Decode a file and rotate/flip it upright according to its EXIF orientation.
pub fn load_oriented(path: &Path) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

// ── Transform ────────────────────────────────────────────────────────

/// Converts photos and status messages into frames for one panel size.
pub struct ImageTransform {
    geometry: DisplayGeometry,
    options: TransformOptions,
    span: Span,
}

impl ImageTransform {
    pub fn new(geometry: DisplayGeometry, options: TransformOptions) -> Self {
        Self {
            geometry,
            options,
            span: tracing::info_span!("transform"),
        }
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Load and convert a photo. Failures are logged and yield `None`.
    pub fn process(&self, path: &Path) -> Option<Bitmap> {
        let _enter = self.span.enter();
        match self.try_process(path) {
            Ok(bitmap) => {
                tracing::debug!("Processed image: {}", path.display());
                Some(bitmap)
            }
            Err(e) => {
                tracing::error!("Error processing {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load and convert a photo, returning the decode error if any.
    pub fn try_process(&self, path: &Path) -> Result<Bitmap, Box<dyn std::error::Error>> {
        let img = load_oriented(path)?;
        Ok(self.render(&img))
    }

    /// Run the pipeline on an already decoded image.
    pub fn render(&self, source: &DynamicImage) -> Bitmap {
        if self.geometry.is_empty() {
            return Bitmap::white(self.geometry);
        }
        let rgb = source.to_rgb8();

        let (width, height) = fit_size(rgb.width(), rgb.height(), self.geometry);
        let resized = imageops::resize(&rgb, width, height, FilterType::Lanczos3);
        let enhanced = enhance_contrast(&resized, self.options.contrast);
        let dithered = dither_to_bilevel(&enhanced);

        let mut canvas = Bitmap::white(self.geometry);
        let (x_offset, y_offset) = center_offset(dithered.dimensions(), self.geometry);
        canvas.paste_luma(&dithered, x_offset, y_offset);

        if let Some(border) = self.options.border_width {
            draw_border(&mut canvas, border);
        }
        canvas
    }

    /// Draw `text` centered on a blank frame. Lines are split on `\n`.
    pub fn render_text(&self, text: &str) -> Bitmap {
        let _enter = self.span.enter();
        let font = font_by_name(&self.options.font).unwrap_or_else(|| {
            tracing::warn!("Unknown font {:?}, using 6x10", self.options.font);
            FALLBACK_FONT
        });

        let mut canvas = Bitmap::white(self.geometry);
        let line_count = text.lines().count().max(1) as i32;
        let block_height = line_count * font.character_size.height as i32;
        let top = (self.geometry.height as i32 - block_height) / 2;

        let character_style = MonoTextStyle::new(font, BinaryColor::On);
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Top)
            .build();
        let origin = Point::new(self.geometry.width as i32 / 2, top);
        let Ok(_) =
            Text::with_text_style(text, origin, character_style, text_style).draw(&mut canvas);
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    const PANEL: DisplayGeometry = DisplayGeometry {
        width: 250,
        height: 122,
    };

    fn plain_options() -> TransformOptions {
        TransformOptions {
            contrast: 1.0,
            border_width: None,
            font: "10x20".to_string(),
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value; 3])))
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 255 / width.max(1)) ^ (y * 7)) as u8;
            Rgb([v, v / 2, 255 - v])
        }))
    }

    /// Bounding box (x, y, w, h) of the black pixels.
    fn black_bounds(bitmap: &Bitmap) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..bitmap.height() {
            for x in 0..bitmap.width() {
                if !bitmap.is_white(x, y) {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }
        bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    #[rstest]
    #[case(1000, 500, (244, 122))] // slightly narrower than the panel
    #[case(3000, 1000, (250, 83))] // wider than the panel
    #[case(100, 100, (122, 122))]
    #[case(100, 400, (30, 122))]
    #[case(100_000, 1, (250, 1))] // never collapses to zero
    #[case(0, 0, (122, 122))]
    fn test_fit_size(#[case] w: u32, #[case] h: u32, #[case] expected: (u32, u32)) {
        assert_eq!(fit_size(w, h, PANEL), expected);
    }

    #[rstest]
    #[case((244, 122), (3, 0))]
    #[case((250, 83), (0, 19))]
    #[case((245, 122), (2, 0))] // odd residual biases top-left
    #[case((250, 121), (0, 0))]
    #[case((250, 122), (0, 0))]
    fn test_center_offset(#[case] size: (u32, u32), #[case] expected: (u32, u32)) {
        assert_eq!(center_offset(size, PANEL), expected);
    }

    #[rstest]
    #[case(1000, 500)]
    #[case(40, 300)]
    #[case(7, 3)]
    #[case(1, 1)]
    fn render_always_fills_exact_panel(#[case] w: u32, #[case] h: u32) {
        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        let bitmap = transform.render(&gradient(w, h));
        assert_eq!(bitmap.geometry(), PANEL);
        assert_eq!(bitmap.as_bytes().len(), bitmap.stride() * 122);
        let luma = bitmap.to_luma_image();
        assert!(luma.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[rstest]
    #[case(0, 122)]
    #[case(250, 0)]
    fn empty_panel_renders_empty_frame(#[case] width: u32, #[case] height: u32) {
        let geometry = DisplayGeometry::new(width, height);
        assert_eq!(fit_size(640, 480, geometry), (0, 0));
        let bitmap = ImageTransform::new(geometry, TransformOptions::default())
            .render(&gradient(640, 480));
        assert_eq!(bitmap.geometry(), geometry);
        assert!(bitmap.as_bytes().is_empty());
    }

    #[test]
    fn render_centers_inscribed_image_with_source_ratio() {
        let transform = ImageTransform::new(PANEL, plain_options());
        let bitmap = transform.render(&solid(1000, 500, 0));
        assert_eq!(black_bounds(&bitmap), Some((3, 0, 244, 122)));

        let tall = transform.render(&solid(100, 400, 0));
        assert_eq!(black_bounds(&tall), Some((110, 0, 30, 122)));
    }

    #[test]
    fn render_is_deterministic() {
        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        let source = gradient(640, 480);
        assert_eq!(transform.render(&source), transform.render(&source));
    }

    #[test]
    fn dither_produces_mixed_pattern_for_mid_gray() {
        let gray = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let dithered = dither_to_bilevel(&gray);
        let black = dithered.pixels().filter(|p| p[0] == 0).count();
        assert!(dithered.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(black > 32 * 32 / 4 && black < 32 * 32 * 3 / 4);
    }

    #[test]
    fn contrast_of_one_is_identity() {
        let img = gradient(16, 16).to_rgb8();
        assert_eq!(enhance_contrast(&img, 1.0), img);
    }

    #[test]
    fn contrast_of_zero_flattens_to_mean() {
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([if x == 0 { 100 } else { 200 }; 3]));
        let flat = enhance_contrast(&img, 0.0);
        assert_eq!(flat.get_pixel(0, 0), flat.get_pixel(1, 0));
        assert_eq!(flat.get_pixel(0, 0)[0], 150);
    }

    #[test]
    fn contrast_above_one_spreads_and_clips() {
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([if x == 0 { 100 } else { 200 }; 3]));
        let spread = enhance_contrast(&img, 2.0);
        assert_eq!(spread.get_pixel(0, 0)[0], 50);
        assert_eq!(spread.get_pixel(1, 0)[0], 250);

        let clipped = enhance_contrast(&img, 4.0);
        assert_eq!(clipped.get_pixel(0, 0)[0], 0);
        assert_eq!(clipped.get_pixel(1, 0)[0], 255);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn border_only_touches_edge_band(#[case] width: u32) {
        let source = gradient(300, 200);
        let plain = ImageTransform::new(PANEL, plain_options()).render(&source);
        let bordered = ImageTransform::new(
            PANEL,
            TransformOptions {
                border_width: Some(width),
                ..plain_options()
            },
        )
        .render(&source);

        assert_eq!(bordered.geometry(), PANEL);
        for y in 0..PANEL.height {
            for x in 0..PANEL.width {
                let in_band =
                    x < width || y < width || x >= PANEL.width - width || y >= PANEL.height - width;
                if in_band {
                    assert!(!bordered.is_white(x, y), "({x}, {y}) should be border");
                } else {
                    assert_eq!(bordered.is_white(x, y), plain.is_white(x, y));
                }
            }
        }
    }

    #[rstest]
    #[case([255, 0, 0], 76)]
    #[case([0, 255, 0], 150)]
    #[case([0, 0, 255], 29)]
    #[case([255, 255, 255], 255)]
    #[case([128, 128, 128], 128)]
    fn luma_uses_rec601_weights(#[case] rgb: [u8; 3], #[case] expected: u8) {
        let img = RgbImage::from_pixel(1, 1, Rgb(rgb));
        assert_eq!(luma601(&img).get_pixel(0, 0)[0], expected);
    }

    /// Minimal big-endian TIFF block holding a single Orientation tag.
    fn exif_orientation(value: u8) -> Vec<u8> {
        vec![
            b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, // header, IFD0 at 8
            0x00, 0x01, // one entry
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, // Orientation, SHORT, count 1
            0x00, value, 0x00, 0x00, // value, padded
            0x00, 0x00, 0x00, 0x00, // no next IFD
        ]
    }

    fn write_jpeg_with_orientation(path: &Path, img: &RgbImage, orientation: u8) {
        use image::codecs::jpeg::JpegEncoder;
        use image::{ExtendedColorType, ImageEncoder};

        let file = std::fs::File::create(path).unwrap();
        let mut encoder = JpegEncoder::new_with_quality(file, 95);
        encoder
            .set_exif_metadata(exif_orientation(orientation))
            .unwrap();
        encoder
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
            .unwrap();
    }

    #[test]
    fn load_oriented_applies_exif_rotation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sideways.jpg");
        // 100x40 landscape sensor data, tagged "rotate 90 CW" (orientation 6).
        write_jpeg_with_orientation(&path, &RgbImage::from_pixel(100, 40, Rgb([0, 0, 0])), 6);

        let img = load_oriented(&path).unwrap();
        assert_eq!((img.width(), img.height()), (40, 100));

        let bitmap = ImageTransform::new(PANEL, plain_options())
            .try_process(&path)
            .unwrap();
        // 40x100 fits as 48x122, centered at x = (250 - 48) / 2.
        assert_eq!(black_bounds(&bitmap), Some((101, 0, 48, 122)));
    }

    #[test]
    fn zero_border_draws_nothing() {
        let mut canvas = Bitmap::white(PANEL);
        draw_border(&mut canvas, 0);
        assert_eq!(canvas.black_count(), 0);
    }

    #[test]
    fn process_reads_file_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        gradient(64, 48).save(&path).unwrap();

        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        let first = transform.process(&path).unwrap();
        let second = transform.process(&path).unwrap();
        assert_eq!(first.geometry(), PANEL);
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn process_returns_none_for_missing_file() {
        let tmp = TempDir::new().unwrap();
        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        assert!(transform.process(&tmp.path().join("gone.jpg")).is_none());
    }

    #[test]
    fn process_returns_none_for_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        assert!(transform.process(&path).is_none());
    }

    #[rstest]
    #[case("10x20", true)]
    #[case("9X15_BOLD", true)]
    #[case("6x10", true)]
    #[case("DejaVuSans-Bold", false)]
    fn test_font_by_name(#[case] name: &str, #[case] found: bool) {
        assert_eq!(font_by_name(name).is_some(), found);
    }

    #[test]
    fn render_text_draws_inside_canvas() {
        let transform = ImageTransform::new(PANEL, TransformOptions::default());
        let bitmap = transform.render_text("Picture Frame\n3 images loaded");
        assert_eq!(bitmap.geometry(), PANEL);
        let (x, y, w, h) = black_bounds(&bitmap).unwrap();
        assert!(x > 0 && y > 0);
        assert!(x + w < PANEL.width && y + h < PANEL.height);
    }

    #[test]
    fn render_text_falls_back_for_unknown_font() {
        let options = TransformOptions {
            font: "no-such-font".to_string(),
            ..TransformOptions::default()
        };
        let bitmap = ImageTransform::new(PANEL, options).render_text("Hello");
        assert!(bitmap.black_count() > 0);
    }
}
