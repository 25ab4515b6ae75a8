//! Square crop, 3-channel normalisation and colour space conversion.

use image::{DynamicImage, GenericImageView};
use ndarray::Array3;

use crate::config::ColorSpace;
use crate::types::{LoadedImage, PreprocessedImage};

/// Turns decoded images into square H×W×3 arrays in the configured colour space.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    crop_size: Option<u32>,
    space: ColorSpace,
}

impl Preprocessor {
    pub fn new(crop_size: Option<u32>, space: ColorSpace) -> Self {
        Self { crop_size, space }
    }

    /// Consume a loaded image; its raw buffer is dropped on return.
    pub fn preprocess(&self, loaded: LoadedImage) -> PreprocessedImage {
        let LoadedImage { identity, raw } = loaded;
        let pixels = self.to_array(&raw);
        PreprocessedImage { identity, pixels }
    }

    /// Crop, drop alpha / broadcast gray, then remap colour.
    pub fn to_array(&self, raw: &DynamicImage) -> Array3<f64> {
        let (width, height) = raw.dimensions();
        let shorter = width.min(height);
        let side = self.crop_size.map_or(shorter, |s| s.min(shorter));

        let rgb = raw.crop_imm(0, 0, side, side).to_rgb8();
        let side = side as usize;
        let mut pixels = Array3::<f64>::zeros((side, side, 3));
        for (x, y, px) in rgb.enumerate_pixels() {
            let [r, g, b] = px.0.map(f64::from);
            let converted = match self.space {
                ColorSpace::Rgb => [r, g, b],
                ColorSpace::Hsb => rgb_to_hsb(r, g, b),
                ColorSpace::Ycbcr => rgb_to_ycbcr(r, g, b),
            };
            for (c, v) in converted.into_iter().enumerate() {
                pixels[[y as usize, x as usize, c]] = v;
            }
        }
        pixels
    }
}

/// Hue in degrees [0, 360), saturation and brightness in percent.
pub fn rgb_to_hsb(r: f64, g: f64, b: f64) -> [f64; 3] {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    [hue % 360.0, saturation * 100.0, max * 100.0]
}

/// 8-bit studio-range YCbCr.
pub fn rgb_to_ycbcr(r: f64, g: f64, b: f64) -> [f64; 3] {
    let y = 16.0 + 219.0 * (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
    let cb = 128.0 + 224.0 * (-0.168736 * r - 0.331264 * g + 0.5 * b) / 255.0;
    let cr = 128.0 + 224.0 * (0.5 * r - 0.418688 * g - 0.081312 * b) / 255.0;
    [y.clamp(16.0, 235.0), cb.clamp(16.0, 240.0), cr.clamp(16.0, 240.0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageIdentity;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::path::PathBuf;

    fn loaded(raw: DynamicImage) -> LoadedImage {
        let (width, height) = raw.dimensions();
        LoadedImage {
            identity: ImageIdentity {
                path: PathBuf::from("/data/sea/a.png"),
                size: 1,
                width,
                height,
                label: "sea".into(),
            },
            raw,
        }
    }

    #[test]
    fn test_crops_to_shorter_side_from_top_left() {
        let mut img = RgbImage::new(6, 4);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(5, 0, Rgb([255, 255, 255]));
        let out = Preprocessor::new(None, ColorSpace::Rgb).preprocess(loaded(DynamicImage::ImageRgb8(img)));
        assert_eq!(out.pixels.dim(), (4, 4, 3));
        assert_eq!(out.pixels[[0, 0, 0]], 10.0);
        assert_eq!(out.pixels[[0, 0, 2]], 30.0);
        // Pixel dimensions still describe the source
        assert_eq!((out.identity.width, out.identity.height), (6, 4));
    }

    #[test]
    fn test_fixed_crop_is_clamped_to_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(5, 5));
        assert_eq!(Preprocessor::new(Some(3), ColorSpace::Rgb).to_array(&img).dim(), (3, 3, 3));
        assert_eq!(Preprocessor::new(Some(9), ColorSpace::Rgb).to_array(&img).dim(), (5, 5, 3));
    }

    #[test]
    fn test_alpha_dropped_and_gray_broadcast() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 200]));
        let out = Preprocessor::new(None, ColorSpace::Rgb).to_array(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(out.dim(), (2, 2, 3));
        assert_eq!(out[[1, 1, 2]], 3.0);

        let gray = GrayImage::from_pixel(2, 2, Luma([77]));
        let out = Preprocessor::new(None, ColorSpace::Rgb).to_array(&DynamicImage::ImageLuma8(gray));
        assert!(out.iter().all(|&v| v == 77.0));
    }

    #[test]
    fn test_hsb_conversion() {
        assert_eq!(rgb_to_hsb(255.0, 0.0, 0.0), [0.0, 100.0, 100.0]);
        let [h, s, v] = rgb_to_hsb(0.0, 255.0, 0.0);
        assert!((h - 120.0).abs() < 1e-9 && (s - 100.0).abs() < 1e-9 && (v - 100.0).abs() < 1e-9);
        let [h, _, _] = rgb_to_hsb(0.0, 0.0, 255.0);
        assert!((h - 240.0).abs() < 1e-9);
        assert_eq!(rgb_to_hsb(0.0, 0.0, 0.0), [0.0, 0.0, 0.0]);
        let [h, s, _] = rgb_to_hsb(255.0, 0.0, 128.0);
        assert!(h > 300.0 && h < 360.0 && s > 99.0);
    }

    #[test]
    fn test_ycbcr_ranges() {
        let [y, cb, cr] = rgb_to_ycbcr(0.0, 0.0, 0.0);
        assert_eq!(y, 16.0);
        assert!((cb - 128.0).abs() < 1e-9 && (cr - 128.0).abs() < 1e-9);
        let [y, _, _] = rgb_to_ycbcr(255.0, 255.0, 255.0);
        assert!((y - 235.0).abs() < 1e-9);
        let [_, _, cr] = rgb_to_ycbcr(255.0, 0.0, 0.0);
        assert!((cr - 240.0).abs() < 1e-9);
    }
}
