//! Image transform pipeline.
//!
//! Turns an arbitrary source image into a panel-ready [`Frame`]. The stages run
//! in a fixed order: orientation, resize, inversion, enhancement. Enhancement
//! runs last so it sees final pixel geometry.

use crate::config::{DisplaySettings, ImageSettings, Orientation};
use crate::error::DisplayError;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Pixel, Rgb, RgbImage};

/// A panel-ready RGB pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an existing RGB buffer.
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Convert any image into an RGB frame without resizing it.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self {
            image: image.to_rgb8(),
        }
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, color: Rgb<u8>) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, color),
        }
    }

    /// A solid black (blanking) frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self::solid(width, height, Rgb([0, 0, 0]))
    }

    /// A solid white frame.
    pub fn white(width: u32, height: u32) -> Self {
        Self::solid(width, height, Rgb([255, 255, 255]))
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The underlying RGB buffer.
    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Consume the frame, returning the RGB buffer.
    pub fn into_rgb(self) -> RgbImage {
        self.image
    }

    /// Whether every pixel has zero luminance.
    pub fn is_solid_black(&self) -> bool {
        !self.image.as_raw().is_empty() && self.image.pixels().all(|p| luma(p) == 0)
    }
}

/// Whether `image` is a uniformly black (blanking) image.
///
/// Uses the same 601 luma as [`Frame::is_solid_black`], so near-black pixels
/// that round to zero luminance count as black. Empty images are never black.
pub fn is_solid_black(image: &DynamicImage) -> bool {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return false;
    }
    image.pixels().all(|(_, _, p)| luma(&p.to_rgb()) == 0)
}

/// Run the full pipeline.
///
/// `settings` of `None` skips enhancement entirely.
///
/// # Errors
///
/// - [`DisplayError::EmptyImage`] if `image` has no pixels
/// - [`DisplayError::InvalidResolution`] if either target dimension is zero
pub fn render(
    image: &DynamicImage,
    display: &DisplaySettings,
    settings: Option<&ImageSettings>,
) -> Result<Frame, DisplayError> {
    check_inputs(image, display.resolution)?;

    let mut rgb = image.to_rgb8();
    if display.orientation == Orientation::Vertical {
        rgb = imageops::rotate270(&rgb);
    }
    rgb = resize(rgb, display.resolution);
    if display.inverted {
        rgb = imageops::rotate180(&rgb);
    }
    if let Some(settings) = settings {
        rgb = enhance(rgb, settings);
    }
    Ok(Frame::new(rgb))
}

/// Resize only, as used for blanking frames.
///
/// # Errors
///
/// Same as [`render`].
pub fn fit_to_resolution(image: &DynamicImage, resolution: (u32, u32)) -> Result<Frame, DisplayError> {
    check_inputs(image, resolution)?;
    Ok(Frame::new(resize(image.to_rgb8(), resolution)))
}

fn check_inputs(image: &DynamicImage, resolution: (u32, u32)) -> Result<(), DisplayError> {
    let (width, height) = resolution;
    if width == 0 || height == 0 {
        return Err(DisplayError::InvalidResolution { width, height });
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(DisplayError::EmptyImage);
    }
    Ok(())
}

/// Centre-crop to the target aspect ratio, then resample to the exact size.
fn resize(image: RgbImage, (width, height): (u32, u32)) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (width, height) {
        return image;
    }

    let src_ratio = f64::from(src_w) / f64::from(src_h);
    let target_ratio = f64::from(width) / f64::from(height);

    let (mut crop_w, mut crop_h, mut x, mut y) = (src_w, src_h, 0, 0);
    if src_ratio > target_ratio {
        crop_w = ((f64::from(src_h) * target_ratio) as u32).clamp(1, src_w);
        x = (src_w - crop_w) / 2;
    } else {
        crop_h = ((f64::from(src_w) / target_ratio) as u32).clamp(1, src_h);
        y = (src_h - crop_h) / 2;
    }

    let cropped = imageops::crop_imm(&image, x, y, crop_w, crop_h).to_image();
    if cropped.dimensions() == (width, height) {
        return cropped;
    }
    imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

// =============================================================================
// Enhancement
// =============================================================================

/// Apply brightness, contrast, saturation and sharpness, in that order.
fn enhance(image: RgbImage, settings: &ImageSettings) -> RgbImage {
    if settings.is_identity() {
        return image;
    }

    let mut image = image;
    if settings.brightness != 1.0 {
        image = blend_with(&image, settings.brightness, |_, _, _| Rgb([0, 0, 0]));
    }
    if settings.contrast != 1.0 {
        let mean = mean_luma(&image);
        image = blend_with(&image, settings.contrast, |_, _, _| Rgb([mean; 3]));
    }
    if settings.saturation != 1.0 {
        image = blend_with(&image, settings.saturation, |_, _, p| Rgb([luma(p); 3]));
    }
    if settings.sharpness != 1.0 {
        let smoothed = smooth(&image);
        image = blend_with(&image, settings.sharpness, |x, y, _| *smoothed.get_pixel(x, y));
    }
    image
}

/// Blend each pixel towards `factor` between its degenerate counterpart (0.0)
/// and itself (1.0). Factors above 1.0 extrapolate.
fn blend_with<F>(image: &RgbImage, factor: f32, degenerate: F) -> RgbImage
where
    F: Fn(u32, u32, &Rgb<u8>) -> Rgb<u8>,
{
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let d = degenerate(x, y, p);
        Rgb(std::array::from_fn(|c| {
            let (d, p) = (f32::from(d[c]), f32::from(p[c]));
            (d + (p - d) * factor).round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// ITU-R 601-2 luma.
fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0.map(u32::from);
    ((r * 299 + g * 587 + b * 114) / 1000) as u8
}

fn mean_luma(image: &RgbImage) -> u8 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0;
    }
    let sum: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
    ((sum as f64 / count as f64) + 0.5) as u8
}

/// 3x3 smoothing filter (centre weight 5). Border pixels are left as-is.
fn smooth(image: &RgbImage) -> RgbImage {
    const KERNEL: [u32; 9] = [1, 1, 1, 1, 5, 1, 1, 1, 1];
    const WEIGHT: u32 = 13;

    let (width, height) = image.dimensions();
    let mut out = image.clone();
    if width < 3 || height < 3 {
        return out;
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0u32; 3];
            for (i, k) in KERNEL.iter().enumerate() {
                let sx = x + (i as u32 % 3) - 1;
                let sy = y + (i as u32 / 3) - 1;
                let p = image.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += u32::from(p[c]) * k;
                }
            }
            out.put_pixel(x, y, Rgb(acc.map(|v| ((v + WEIGHT / 2) / WEIGHT) as u8)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(resolution: (u32, u32)) -> DisplaySettings {
        DisplaySettings {
            resolution,
            ..Default::default()
        }
    }

    fn split_image(width: u32, height: u32) -> DynamicImage {
        // Left half red, right half blue.
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        }))
    }

    #[test]
    fn test_render_matches_resolution() {
        let image = split_image(1024, 300);
        let frame = render(&image, &display((800, 480)), None).unwrap();
        assert_eq!(frame.dimensions(), (800, 480));

        let frame = render(&image, &display((13, 977)), Some(&ImageSettings::default())).unwrap();
        assert_eq!(frame.dimensions(), (13, 977));
    }

    #[test]
    fn test_resize_is_noop_at_target_size() {
        let image = split_image(64, 32);
        let frame = render(&image, &display((64, 32)), None).unwrap();
        assert_eq!(frame.as_rgb(), &image.to_rgb8());
    }

    #[test]
    fn test_resize_centre_crops_wide_image() {
        // 400x100 into a square keeps columns 150..250 (half red, half blue).
        let frame = render(&split_image(400, 100), &display((100, 100)), None).unwrap();
        let left = frame.as_rgb().get_pixel(5, 50);
        let right = frame.as_rgb().get_pixel(94, 50);
        assert!(left[0] > 200 && left[2] < 50, "left was {:?}", left);
        assert!(right[2] > 200 && right[0] < 50, "right was {:?}", right);
    }

    #[test]
    fn test_vertical_orientation_rotates_counter_clockwise() {
        // Marker in the top-left corner ends up bottom-left after a 90° CCW turn.
        let mut source = RgbImage::from_pixel(3, 5, Rgb([255, 255, 255]));
        source.put_pixel(0, 0, Rgb([0, 0, 0]));
        let settings = DisplaySettings {
            orientation: Orientation::Vertical,
            resolution: (5, 3),
            ..Default::default()
        };
        let frame = render(&DynamicImage::ImageRgb8(source), &settings, None).unwrap();
        assert_eq!(frame.dimensions(), (5, 3));
        assert_eq!(frame.as_rgb().get_pixel(0, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_inverted_rotates_after_resize() {
        let mut source = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        source.put_pixel(0, 0, Rgb([0, 0, 0]));
        let settings = DisplaySettings {
            inverted: true,
            resolution: (4, 2),
            ..Default::default()
        };
        let frame = render(&DynamicImage::ImageRgb8(source), &settings, None).unwrap();
        assert_eq!(frame.as_rgb().get_pixel(3, 1), &Rgb([0, 0, 0]));
        assert_eq!(frame.as_rgb().get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_enhancement_degenerate_factors() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 40, 90])));

        let dark = ImageSettings {
            brightness: 0.0,
            ..Default::default()
        };
        let frame = render(&image, &display((8, 8)), Some(&dark)).unwrap();
        assert!(frame.is_solid_black());

        let grey = ImageSettings {
            saturation: 0.0,
            ..Default::default()
        };
        let frame = render(&image, &display((8, 8)), Some(&grey)).unwrap();
        let p = frame.as_rgb().get_pixel(4, 4);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_contrast_zero_flattens_to_mean() {
        let image = split_image(10, 10);
        let flat = ImageSettings {
            contrast: 0.0,
            ..Default::default()
        };
        let frame = render(&image, &display((10, 10)), Some(&flat)).unwrap();
        let first = *frame.as_rgb().get_pixel(0, 0);
        assert!(frame.as_rgb().pixels().all(|p| *p == first));
    }

    #[test]
    fn test_identity_settings_leave_pixels_untouched() {
        let image = split_image(16, 16);
        let frame = render(&image, &display((16, 16)), Some(&ImageSettings::default())).unwrap();
        assert_eq!(frame.as_rgb(), &image.to_rgb8());
    }

    #[test]
    fn test_solid_black_detection() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert!(is_solid_black(&black));

        let mut almost = RgbImage::new(10, 10);
        almost.put_pixel(9, 9, Rgb([0, 40, 0]));
        assert!(!is_solid_black(&DynamicImage::ImageRgb8(almost)));

        assert!(!is_solid_black(&DynamicImage::new_rgb8(0, 0)));
        assert!(Frame::black(3, 3).is_solid_black());
        assert!(!Frame::white(3, 3).is_solid_black());
    }

    #[test]
    fn test_black_detectors_agree_on_dark_blue() {
        // 601 luma of (0, 0, 12) is 1; Rec. 709 rounds it to 0.
        let dark = RgbImage::from_pixel(8, 8, Rgb([0, 0, 12]));
        assert!(!is_solid_black(&DynamicImage::ImageRgb8(dark.clone())));
        assert!(!Frame::new(dark).is_solid_black());

        let faint = RgbImage::from_pixel(8, 8, Rgb([1, 0, 1]));
        assert!(is_solid_black(&DynamicImage::ImageRgb8(faint.clone())));
        assert!(Frame::new(faint).is_solid_black());
    }

    #[test]
    fn test_enhancement_order_brightness_before_contrast() {
        // Brightness 2.0 clamps 200 to 255 before contrast flattens to the
        // mean, giving (200 + 255) / 2. The other order would give 255.
        let mut image = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        for x in 0..4 {
            for y in 0..2 {
                image.put_pixel(x, y, Rgb([100, 100, 100]));
            }
        }
        let settings = ImageSettings {
            brightness: 2.0,
            contrast: 0.0,
            ..Default::default()
        };
        let out = enhance(image, &settings);
        assert!(out.pixels().all(|p| *p == Rgb([228, 228, 228])));
    }

    #[test]
    fn test_render_rejects_degenerate_inputs() {
        let image = split_image(4, 4);
        assert!(matches!(
            render(&image, &display((0, 480)), None),
            Err(DisplayError::InvalidResolution { .. })
        ));
        assert!(matches!(
            render(&DynamicImage::new_rgb8(0, 0), &display((8, 8)), None),
            Err(DisplayError::EmptyImage)
        ));
    }
}
