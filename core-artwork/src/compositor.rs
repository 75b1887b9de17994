//! Wallpaper Compositor
//!
//! Turns a cover image into a full-screen wallpaper:
//!
//! - a *background* copy fills the screen (center crop), is enlarged and
//!   blurred heavily
//! - a *focused* copy is drawn sharp in the middle, shrunk only if it does
//!   not fit
//!
//! Both are centered on a transparent canvas of exactly the screen size, so
//! the output dimensions never depend on the cover's aspect ratio.

use crate::error::{ArtworkError, Result};
use crate::similarity::decode_image;
use bytes::Bytes;
use core_runtime::config::CompositorSettings;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// JPEG quality used when the destination asks for a lossy format
const JPEG_QUALITY: u8 = 95;

/// Gaussian sigmas above this are applied on a downscaled copy
const FAST_BLUR_THRESHOLD: f32 = 5.0;

/// Downscale factor for the fast blur path
const FAST_BLUR_SCALE: u32 = 4;

/// Raster format of the generated wallpaper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Lossless; avoids re-compressing the cover
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Picks the format from the destination's extension, PNG if unknown
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }
}

/// Offset that centers an `overlay` on a `canvas`
///
/// Truncates toward zero and goes negative when the overlay is larger than
/// the canvas.
pub fn center_offset(canvas: (u32, u32), overlay: (u32, u32)) -> (i64, i64) {
    let x = (i64::from(canvas.0) - i64::from(overlay.0)) / 2;
    let y = (i64::from(canvas.1) - i64::from(overlay.1)) / 2;
    (x, y)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WallpaperCompositor {
    settings: CompositorSettings,
}

impl WallpaperCompositor {
    pub fn new(settings: CompositorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Composes a `width` x `height` wallpaper from encoded cover bytes
    ///
    /// Runs on the blocking thread pool. Returns the encoded wallpaper.
    pub async fn compose(
        &self,
        width: u32,
        height: u32,
        cover: Bytes,
        format: OutputFormat,
    ) -> Result<Bytes> {
        let compositor = *self;
        tokio::task::spawn_blocking(move || compositor.compose_blocking(width, height, &cover, format))
            .await
            .map_err(|e| ArtworkError::Composition(format!("compose task failed: {}", e)))?
    }

    /// Synchronous form of [`compose`](Self::compose)
    pub fn compose_blocking(
        &self,
        width: u32,
        height: u32,
        cover: &[u8],
        format: OutputFormat,
    ) -> Result<Bytes> {
        if width == 0 || height == 0 {
            return Err(ArtworkError::Composition(format!(
                "invalid canvas size {}x{}",
                width, height
            )));
        }

        let cover = decode_image(cover)
            .map_err(|e| ArtworkError::Composition(format!("cover not decodable: {}", e)))?;
        let canvas = self.render(width, height, &cover);
        encode(canvas, format)
    }

    /// Draws the wallpaper onto a fresh canvas
    pub fn render(&self, width: u32, height: u32, cover: &DynamicImage) -> RgbaImage {
        let focused = focused_copy(cover, width, height);
        let background = background_copy(
            cover,
            width,
            height,
            self.settings.background_scale,
            self.settings.blur_radius,
        );

        debug!(
            width,
            height,
            cover_width = cover.width(),
            cover_height = cover.height(),
            focused_width = focused.width(),
            focused_height = focused.height(),
            "Composing wallpaper"
        );

        let mut canvas = RgbaImage::new(width, height);
        for layer in [background.to_rgba8(), focused.to_rgba8()] {
            let (x, y) = center_offset((width, height), layer.dimensions());
            imageops::overlay(&mut canvas, &layer, x, y);
        }
        canvas
    }
}

/// The cover, shrunk to fit inside the canvas if needed but never enlarged
pub fn focused_copy(cover: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if cover.width() > width || cover.height() > height {
        cover.resize(width, height, FilterType::Lanczos3)
    } else {
        cover.clone()
    }
}

/// The cover filling the canvas, enlarged by `scale` and blurred
pub fn background_copy(
    cover: &DynamicImage,
    width: u32,
    height: u32,
    scale: f32,
    blur_radius: f32,
) -> DynamicImage {
    let filled = cover.resize_to_fill(width, height, FilterType::Triangle);

    let scaled_width = ((width as f32) * scale).round().max(1.0) as u32;
    let scaled_height = ((height as f32) * scale).round().max(1.0) as u32;
    let enlarged = filled.resize_exact(scaled_width, scaled_height, FilterType::Triangle);

    fast_blur(&enlarged, blur_radius)
}

/// Gaussian sigma for a blur `radius` in pixels
///
/// The kernel is cut off at two sigmas, so a radius of 20 spreads each
/// pixel about 20 pixels out.
pub fn radius_to_sigma(radius: f32) -> f32 {
    (radius / 2.0).max(0.0)
}

/// Blur of `radius` pixels, approximated on a downscaled copy when large
fn fast_blur(image: &DynamicImage, radius: f32) -> DynamicImage {
    let sigma = radius_to_sigma(radius);
    if sigma <= 0.0 {
        return image.clone();
    }
    if sigma <= FAST_BLUR_THRESHOLD {
        return image.blur(sigma);
    }

    let (width, height) = image.dimensions();
    let small_width = (width / FAST_BLUR_SCALE).max(1);
    let small_height = (height / FAST_BLUR_SCALE).max(1);

    image
        .resize_exact(small_width, small_height, FilterType::Triangle)
        .blur(sigma / FAST_BLUR_SCALE as f32)
        .resize_exact(width, height, FilterType::Triangle)
}

fn encode(canvas: RgbaImage, format: OutputFormat) -> Result<Bytes> {
    let mut encoded = Vec::new();
    let image = DynamicImage::ImageRgba8(canvas);

    match format {
        OutputFormat::Png => image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|e| ArtworkError::Composition(format!("PNG encoding failed: {}", e)))?,
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| ArtworkError::Composition(format!("JPEG encoding failed: {}", e)))?
        }
    }

    Ok(Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_center_offset() {
        assert_eq!(center_offset((100, 50), (20, 10)), (40, 20));
        assert_eq!(center_offset((100, 50), (150, 75)), (-25, -12));
        assert_eq!(center_offset((101, 51), (100, 50)), (0, 0));
        assert_eq!(center_offset((10, 10), (13, 13)), (-1, -1));
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("a/b.JPG")), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path(Path::new("b.jpeg")), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path(Path::new("b.png")), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), OutputFormat::Png);
    }

    #[test]
    fn test_focused_copy_never_upscales() {
        let small = solid(20, 10, [1, 2, 3]);
        assert_eq!(focused_copy(&small, 100, 100).dimensions(), (20, 10));

        let wide = solid(400, 200, [1, 2, 3]);
        assert_eq!(focused_copy(&wide, 100, 100).dimensions(), (100, 50));

        let tall = solid(50, 250, [1, 2, 3]);
        assert_eq!(focused_copy(&tall, 100, 100).dimensions(), (20, 100));
    }

    #[test]
    fn test_radius_to_sigma() {
        assert_eq!(radius_to_sigma(20.0), 10.0);
        assert_eq!(radius_to_sigma(3.0), 1.5);
        assert_eq!(radius_to_sigma(0.0), 0.0);
        assert_eq!(radius_to_sigma(-4.0), 0.0);
    }

    #[test]
    fn test_blur_spreads_about_radius() {
        // One white column on black
        let stripe = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 4, |x, _| {
            if x == 32 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }));
        let blurred = fast_blur(&stripe, 8.0).to_rgb8();

        let at = |x: u32| blurred.get_pixel(x, 2)[0];
        assert!(at(32) < 255);
        assert!(at(36) > 0, "no spread inside the radius");
        assert_eq!(at(60), 0, "spread far beyond the radius");

        assert_eq!(fast_blur(&stripe, 0.0).to_rgb8(), stripe.to_rgb8());
    }

    #[test]
    fn test_background_is_enlarged_canvas() {
        let cover = solid(30, 60, [9, 9, 9]);
        let background = background_copy(&cover, 64, 36, 1.5, 20.0);
        assert_eq!(background.dimensions(), (96, 54));
    }

    #[test]
    fn test_render_is_opaque_and_keeps_focused_sharp() {
        let compositor = WallpaperCompositor::default();
        let cover = solid(20, 20, [200, 10, 10]);

        let canvas = compositor.render(100, 60, &cover);

        assert_eq!(canvas.dimensions(), (100, 60));
        let close = |a: Rgba<u8>, b: [u8; 4]| a.0.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 1);
        assert!(close(*canvas.get_pixel(50, 30), [200, 10, 10, 255]));
        // Background covers the whole canvas
        assert!(canvas.get_pixel(0, 0).0[3] >= 254);
    }

    #[test]
    fn test_compose_rejects_bad_input() {
        let compositor = WallpaperCompositor::default();

        assert!(matches!(
            compositor.compose_blocking(0, 10, b"irrelevant", OutputFormat::Png),
            Err(ArtworkError::Composition(_))
        ));
        assert!(matches!(
            compositor.compose_blocking(10, 10, b"not an image", OutputFormat::Png),
            Err(ArtworkError::Composition(_))
        ));
    }

    #[tokio::test]
    async fn test_compose_encodes_requested_format() {
        let mut cover = Vec::new();
        solid(40, 40, [30, 60, 90])
            .write_to(&mut Cursor::new(&mut cover), ImageFormat::Png)
            .unwrap();
        let compositor = WallpaperCompositor::default();

        let png = compositor
            .compose(80, 45, Bytes::from(cover.clone()), OutputFormat::Png)
            .await
            .unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);

        let jpeg = compositor
            .compose(80, 45, Bytes::from(cover), OutputFormat::Jpeg)
            .await
            .unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        assert_eq!(decode_image(&jpeg).unwrap().dimensions(), (80, 45));
    }
}
