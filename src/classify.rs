use std::collections::BTreeMap;

use image::GrayImage;
use imageproc::{drawing::draw_polygon_mut, point::Point};
use logging_timer::time;
use rayon::prelude::*;

use crate::bubbles::BubbleCandidate;
use crate::config::MarkThresholds;
use crate::image_utils::WHITE;
use crate::layout::Question;
use crate::types::{OptionLetter, QuestionNumber};

/// Detected option per answered question. Unanswered questions are absent.
pub type StudentAnswers = BTreeMap<QuestionNumber, OptionLetter>;

/// Classification outcome for one question.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestionMark {
    pub number: QuestionNumber,
    pub fill_ratios: Vec<f64>,
    pub choice: Option<OptionLetter>,
}

/// Foreground mask pixels inside the bubble's filled contour divided by the
/// contour's area. Degenerate contours have a ratio of zero.
pub fn fill_ratio(mask: &GrayImage, bubble: &BubbleCandidate) -> f64 {
    if bubble.points.len() < 3 || bubble.area <= 0.0 {
        return 0.0;
    }

    let bounds = bubble.bounds;
    let local_points = bubble
        .points
        .iter()
        .map(|p| Point::new(p.x - bounds.left(), p.y - bounds.top()))
        .collect::<Vec<Point<i32>>>();
    let mut inside = GrayImage::new(bounds.width(), bounds.height());
    draw_polygon_mut(&mut inside, &local_points, WHITE);

    let filled = inside
        .enumerate_pixels()
        .filter(|(_, _, pixel)| **pixel == WHITE)
        .filter(|(x, y, _)| {
            let mx = bounds.left() + *x as i32;
            let my = bounds.top() + *y as i32;
            mx >= 0
                && my >= 0
                && (mx as u32) < mask.width()
                && (my as u32) < mask.height()
                && *mask.get_pixel(mx as u32, my as u32) == WHITE
        })
        .count();

    filled as f64 / bubble.area
}

/// Picks the option with the highest fill ratio, provided it is strictly above
/// `threshold`. Equal ratios go to the earliest option.
pub fn choose_option(fill_ratios: &[f64], threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &ratio) in fill_ratios.iter().enumerate() {
        if ratio <= threshold || ratio.is_nan() {
            continue;
        }
        match best {
            Some((_, best_ratio)) if ratio <= best_ratio => {}
            _ => best = Some((index, ratio)),
        }
    }
    best.map(|(index, _)| index)
}

pub fn classify_question(mask: &GrayImage, question: &Question, thresholds: &MarkThresholds) -> QuestionMark {
    let fill_ratios = question
        .bubbles
        .iter()
        .map(|bubble| fill_ratio(mask, bubble))
        .collect::<Vec<f64>>();
    let choice = choose_option(&fill_ratios, thresholds.fill).map(OptionLetter::from_index);
    QuestionMark {
        number: question.number,
        fill_ratios,
        choice,
    }
}

/// Classifies every question in parallel. The result keeps the input order.
#[time]
pub fn classify_questions(
    mask: &GrayImage,
    questions: &[Question],
    thresholds: &MarkThresholds,
) -> Vec<QuestionMark> {
    questions
        .par_iter()
        .map(|question| classify_question(mask, question, thresholds))
        .collect()
}

pub fn student_answers(marks: &[QuestionMark]) -> StudentAnswers {
    marks
        .iter()
        .filter_map(|mark| mark.choice.map(|choice| (mark.number, choice)))
        .collect()
}
