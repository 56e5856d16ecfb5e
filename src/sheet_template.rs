use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::types::Size;

/// Describes the printed layout of an answer sheet: how many question columns sit
/// side by side on each visual row, how many options each question has, what a
/// bubble looks like, and how far apart two bubbles may be vertically while still
/// belonging to the same row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetTemplate {
    /// Questions flow down column 0, then down column 1, and so on.
    pub question_columns: usize,
    pub options_per_question: usize,
    pub bubble: BubbleBounds,
    pub row_tolerance: RowTolerance,
}

impl Default for SheetTemplate {
    fn default() -> Self {
        Self {
            question_columns: 4,
            options_per_question: 4,
            bubble: BubbleBounds::default(),
            row_tolerance: RowTolerance::default(),
        }
    }
}

/// Size and shape limits for a contour to count as a bubble. Scans at a higher
/// resolution need larger bounds; the aspect ratio limits reject dashes and
/// vertical strokes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BubbleBounds {
    pub min_size: Size<u32>,
    pub max_size: Size<u32>,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

impl Default for BubbleBounds {
    fn default() -> Self {
        Self {
            min_size: Size {
                width: 20,
                height: 20,
            },
            max_size: Size {
                width: 50,
                height: 50,
            },
            min_aspect_ratio: 0.7,
            max_aspect_ratio: 1.3,
        }
    }
}

/// How far a bubble's top edge may sit below the top edge of the first bubble in
/// the current row before it starts a new row.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RowTolerance {
    /// A multiple of the candidate bubble's own height. Follows scan resolution.
    #[serde(rename_all = "camelCase")]
    RelativeToHeight { factor: f32 },

    /// A fixed number of pixels.
    #[serde(rename_all = "camelCase")]
    Fixed { pixels: u32 },
}

impl Default for RowTolerance {
    fn default() -> Self {
        RowTolerance::RelativeToHeight { factor: 1.0 }
    }
}

impl RowTolerance {
    /// The vertical distance at which `rect` no longer belongs to the current row.
    pub fn limit_for(&self, rect: &Rect) -> f32 {
        match self {
            RowTolerance::RelativeToHeight { factor } => rect.height() as f32 * factor,
            RowTolerance::Fixed { pixels } => *pixels as f32,
        }
    }
}

/// Determines whether a rect could be a bubble based on its size and shape.
pub fn rect_could_be_bubble(bounds: &BubbleBounds, rect: &Rect) -> bool {
    let aspect_ratio = rect.width() as f32 / rect.height() as f32;
    rect.width() >= bounds.min_size.width
        && rect.width() <= bounds.max_size.width
        && rect.height() >= bounds.min_size.height
        && rect.height() <= bounds.max_size.height
        && aspect_ratio >= bounds.min_aspect_ratio
        && aspect_ratio <= bounds.max_aspect_ratio
}
