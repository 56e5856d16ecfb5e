use image::{GrayImage, Luma, Rgb};
use imageproc::filter::separable_filter_equal;

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const DARK_GREEN: Rgb<u8> = Rgb([0, 127, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const CYAN: Rgb<u8> = Rgb([0, 255, 255]);
pub const PINK: Rgb<u8> = Rgb([255, 0, 255]);
pub const ORANGE: Rgb<u8> = Rgb([255, 127, 0]);

pub const RAINBOW: [Rgb<u8>; 6] = [RED, ORANGE, GREEN, CYAN, BLUE, PINK];

/// Builds a normalized 1D Gaussian kernel of the given odd size. The standard
/// deviation is derived from the size the way common vision libraries do when no
/// sigma is given: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as usize;
    let radius = (size - 1) as f32 / 2.0;
    let sigma = 0.3 * (radius - 1.0) + 0.8;
    let weights = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect::<Vec<f32>>();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Gaussian blur with a square kernel of `kernel_size`. Pixels outside the image
/// repeat the nearest edge pixel.
pub fn gaussian_blur(img: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    separable_filter_equal(img, &gaussian_kernel(kernel_size))
}

/// Determines the number of pixels in an image that match the given luma.
pub fn count_pixels(img: &GrayImage, luma: &Luma<u8>) -> u32 {
    img.pixels().filter(|p| *p == luma).count() as u32
}

/// Determines the ratio of pixels in an image that match the given luma.
pub fn ratio(img: &GrayImage, luma: &Luma<u8>) -> f32 {
    let total = img.width() * img.height();
    if total == 0 {
        return 0.0;
    }
    count_pixels(img, luma) as f32 / total as f32
}
