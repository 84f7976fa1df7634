//! Per-pixel image operations that build the detection image.

use crate::core_modules::pixel::pixel::Pixel;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::map::{map_colors, map_colors2};

/// Converts a packed RGB frame to gray using Rec. 601 luma.
pub fn grayscale(image: &RgbImage) -> GrayImage {
    map_colors(image, |rgb: Rgb<u8>| Luma([Pixel::from(rgb).gray()]))
}

/// `|background - gray|` per pixel. Both images must have the same dimensions.
pub fn absolute_difference(background: &GrayImage, gray: &GrayImage) -> GrayImage {
    map_colors2(background, gray, |a: Luma<u8>, b: Luma<u8>| Luma([a[0].abs_diff(b[0])]))
}

/// Background subtraction: pixels differing by more than `cut` become 255, the rest 0.
pub fn difference_mask(background: &GrayImage, gray: &GrayImage, cut: u8) -> GrayImage {
    threshold(&absolute_difference(background, gray), cut, ThresholdType::Binary)
}

/// A copy of `image` with every pixel farther than `radius` from `target` set to black.
pub fn color_distance_filter(image: &RgbImage, target: Pixel, radius: u32) -> RgbImage {
    let radius_squared = u64::from(radius) * u64::from(radius);
    map_colors(image, |rgb: Rgb<u8>| {
        let pixel = Pixel::from(rgb);
        if u64::from(pixel.distance_squared(&target)) > radius_squared {
            Rgb(Pixel::BLACK.channels())
        } else {
            rgb
        }
    })
}

/// Binary cut at `>= 1`: a pixel is foreground when any channel is non-zero.
pub fn nonzero_mask(image: &RgbImage) -> GrayImage {
    map_colors(image, |rgb: Rgb<u8>| {
        Luma([if Pixel::from(rgb).max_channel() >= 1 { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_frames_have_empty_difference() {
        let gray = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 16 + y) as u8]));
        let mask = difference_mask(&gray, &gray, 0);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_difference_cut_is_strict() {
        let background = GrayImage::from_pixel(2, 1, Luma([100]));
        let mut gray = background.clone();
        gray.put_pixel(0, 0, Luma([150]));
        gray.put_pixel(1, 0, Luma([151]));
        let mask = difference_mask(&background, &gray, 50);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_color_filter_keeps_target_and_zeroes_outliers() {
        let target = Pixel::new(200, 40, 40);
        let mut image = RgbImage::new(3, 1);
        image.put_pixel(0, 0, Rgb([200, 40, 40]));
        image.put_pixel(1, 0, Rgb([203, 44, 40])); // distance 5
        image.put_pixel(2, 0, Rgb([204, 44, 40])); // distance > 5

        let filtered = color_distance_filter(&image, target, 5);
        assert_eq!(filtered.get_pixel(0, 0), &Rgb([200, 40, 40]));
        assert_eq!(filtered.get_pixel(1, 0), &Rgb([203, 44, 40]));
        assert_eq!(filtered.get_pixel(2, 0), &Rgb([0, 0, 0]));

        let mask = nonzero_mask(&filtered);
        let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![255, 255, 0]);
    }

    #[test]
    fn test_grayscale_dimensions() {
        let image = RgbImage::from_pixel(5, 3, Rgb([255, 255, 255]));
        let gray = grayscale(&image);
        assert_eq!(gray.dimensions(), (5, 3));
        assert!(gray.pixels().all(|p| p[0] == 255));
    }
}
