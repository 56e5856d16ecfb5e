use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma};
use logging_timer::time;

use crate::config::PreprocessOptions;
use crate::image_utils::{gaussian_blur, ratio, BLACK, WHITE};

#[derive(Debug, thiserror::Error)]
pub enum ImageReadError {
    #[error("unable to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Decodes the sheet image at `image_path`. The file is closed before this returns,
/// whether or not decoding succeeded.
#[time]
pub fn load_sheet_image(image_path: &Path) -> Result<DynamicImage, ImageReadError> {
    let img = image::open(image_path).map_err(|source| ImageReadError::Open {
        path: image_path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "loaded {} ({}x{})",
        image_path.display(),
        img.width(),
        img.height()
    );
    Ok(img)
}

/// Converts a scanned sheet into a binary mask where ink is `WHITE` and paper is
/// `BLACK`: grayscale, Gaussian blur, then an inverted adaptive threshold against
/// the Gaussian-weighted local mean.
#[time]
pub fn preprocess(img: &DynamicImage, options: &PreprocessOptions) -> Result<GrayImage, ImageReadError> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(ImageReadError::EmptyImage { width, height });
    }

    let gray = img.to_luma8();
    let blurred = gaussian_blur(&gray, options.blur_kernel_size);
    let mask = adaptive_threshold_inverted(
        &blurred,
        options.threshold_block_size,
        options.threshold_offset,
    );
    log::debug!("mask foreground ratio: {:.3}", ratio(&mask, &WHITE));
    Ok(mask)
}

/// A pixel becomes foreground when it is darker than its local Gaussian-weighted
/// mean by more than `offset`.
pub fn adaptive_threshold_inverted(img: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let local_mean = gaussian_blur(img, block_size);
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y).0[0] as i32;
        let value = pixel.0[0] as i32;
        let luma: Luma<u8> = if value > mean - offset { BLACK } else { WHITE };
        out.put_pixel(x, y, luma);
    }
    out
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};

    use super::*;

    fn sheet_with_dark_square() -> RgbImage {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([250, 250, 250]));
        for y in 30..70 {
            for x in 30..70 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        img
    }

    #[test]
    fn test_preprocess_marks_ink_edges() {
        let img = DynamicImage::ImageRgb8(sheet_with_dark_square());
        let mask = preprocess(&img, &PreprocessOptions::default()).unwrap();
        assert_eq!(mask.dimensions(), (100, 100));

        // ink boundary is foreground
        assert_eq!(*mask.get_pixel(30, 50), WHITE);
        assert_eq!(*mask.get_pixel(50, 30), WHITE);
        // flat paper and flat ink interior are not
        assert_eq!(*mask.get_pixel(5, 5), BLACK);
        assert_eq!(*mask.get_pixel(50, 50), BLACK);
    }

    #[test]
    fn test_preprocess_blank_sheet_is_empty() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([240])));
        let mask = preprocess(&img, &PreprocessOptions::default()).unwrap();
        assert!(mask.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert!(matches!(
            preprocess(&img, &PreprocessOptions::default()),
            Err(ImageReadError::EmptyImage {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn test_load_sheet_image_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        assert!(matches!(
            load_sheet_image(&missing),
            Err(ImageReadError::Open { .. })
        ));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"definitely not a jpeg").unwrap();
        assert!(matches!(
            load_sheet_image(&garbage),
            Err(ImageReadError::Open { .. })
        ));
    }

    #[test]
    fn test_load_sheet_image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.png");
        sheet_with_dark_square().save(&path).unwrap();
        let img = load_sheet_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (100, 100));
    }
}
