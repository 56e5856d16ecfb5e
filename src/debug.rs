use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_filled_rect_mut, draw_hollow_rect_mut};

use crate::{
    bubbles::BubbleCandidate,
    classify::QuestionMark,
    geometry::center_of_rect,
    image_utils::{BLUE, DARK_GREEN, RAINBOW, RED},
    layout::Question,
};

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    result.set_file_name(format!("{}_debug_{}.png", stem, label));
    result
}

/// Writes debug images next to the input image, or does nothing when disabled.
pub struct ImageDebugWriter {
    input_path: PathBuf,
    base: Option<GrayImage>,
}

impl ImageDebugWriter {
    pub fn new(input_path: PathBuf, base: GrayImage) -> Self {
        Self {
            input_path,
            base: Some(base),
        }
    }

    pub fn disabled() -> Self {
        Self {
            input_path: PathBuf::new(),
            base: None,
        }
    }

    /// Draws onto a color copy of the base image and saves it as `label`.
    pub fn write(&self, label: &str, draw: impl FnOnce(&mut RgbImage)) -> Option<PathBuf> {
        let base = self.base.as_ref()?;
        let mut canvas = DynamicImage::ImageLuma8(base.clone()).into_rgb8();
        draw(&mut canvas);
        let path = debug_image_path(&self.input_path, label);
        match canvas.save(&path) {
            Ok(()) => {
                log::debug!("wrote debug image {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("unable to write debug image {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Fills each bubble candidate with a color from the rainbow.
pub fn draw_candidates_debug_image_mut(canvas: &mut RgbImage, candidates: &[BubbleCandidate]) {
    for (i, candidate) in candidates.iter().enumerate() {
        draw_filled_rect_mut(canvas, candidate.bounds, RAINBOW[i % RAINBOW.len()]);
    }
}

/// Outlines every question's bubbles: the chosen option in green with a cross at
/// its centre, the rest in red, and unanswered questions in blue.
pub fn draw_question_marks_debug_image_mut(
    canvas: &mut RgbImage,
    questions: &[Question],
    marks: &[QuestionMark],
) {
    for (question, mark) in questions.iter().zip(marks) {
        for (index, bubble) in question.bubbles.iter().enumerate() {
            let color = match mark.choice {
                Some(choice) if choice.index() == index => DARK_GREEN,
                Some(_) => RED,
                None => BLUE,
            };
            draw_hollow_rect_mut(canvas, bubble.bounds, color);
            if color == DARK_GREEN {
                let center = center_of_rect(&bubble.bounds);
                draw_cross_mut(canvas, color, center.x.round() as i32, center.y.round() as i32);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use imageproc::rect::Rect;

    use super::*;
    use crate::image_utils::BLACK;
    use crate::types::OptionLetter;

    const WHITE_RGB: image::Rgb<u8> = image::Rgb([255, 255, 255]);

    #[test]
    fn test_debug_image_path() {
        assert_eq!(
            debug_image_path(Path::new("/tmp/scans/sheet-01.jpg"), "mask"),
            PathBuf::from("/tmp/scans/sheet-01_debug_mask.png")
        );
    }

    #[test]
    fn test_disabled_writer_writes_nothing() {
        let writer = ImageDebugWriter::disabled();
        let mut called = false;
        assert_eq!(writer.write("mask", |_| called = true), None);
        assert!(!called);
    }

    #[test]
    fn test_writer_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sheet.jpg");
        let writer = ImageDebugWriter::new(input, GrayImage::from_pixel(20, 20, BLACK));
        let path = writer
            .write("candidates", |canvas| {
                draw_filled_rect_mut(canvas, Rect::at(2, 2).of_size(4, 4), WHITE_RGB)
            })
            .unwrap();
        assert_eq!(path, dir.path().join("sheet_debug_candidates.png"));
        let saved = image::open(&path).unwrap().into_rgb8();
        assert_eq!(*saved.get_pixel(3, 3), WHITE_RGB);
    }

    #[test]
    fn test_draw_question_marks() {
        let mut canvas = RgbImage::new(200, 60);
        let question = Question {
            number: 1,
            bubbles: (0..4)
                .map(|i| BubbleCandidate::from_rect(Rect::at(10 + i * 40, 10).of_size(30, 30)))
                .collect(),
        };
        let mark = QuestionMark {
            number: 1,
            fill_ratios: vec![0.1, 0.9, 0.1, 0.1],
            choice: Some(OptionLetter::from_index(1)),
        };
        draw_question_marks_debug_image_mut(&mut canvas, &[question], &[mark]);
        assert_eq!(*canvas.get_pixel(10, 10), RED);
        assert_eq!(*canvas.get_pixel(50, 10), DARK_GREEN);
        assert_eq!(*canvas.get_pixel(65, 25), DARK_GREEN);
    }
}
