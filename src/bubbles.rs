use image::GrayImage;
use imageproc::{
    contours::{find_contours, BorderType, Contour},
    point::Point,
    rect::Rect,
};
use logging_timer::time;

use crate::geometry::{bounding_rect, open_polygon, polygon_area};
use crate::sheet_template::{rect_could_be_bubble, BubbleBounds};

/// A traced outer contour whose bounding box looks like an answer bubble.
#[derive(Clone, Debug, PartialEq)]
pub struct BubbleCandidate {
    pub bounds: Rect,
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

impl BubbleCandidate {
    pub fn from_contour(contour: &Contour<i32>) -> Option<Self> {
        let points = open_polygon(&contour.points).to_vec();
        let bounds = bounding_rect(&points)?;
        let area = polygon_area(&points);
        Some(Self {
            bounds,
            points,
            area,
        })
    }

    /// A candidate whose contour is exactly the border of `rect`.
    #[cfg(test)]
    pub fn from_rect(rect: Rect) -> Self {
        let (left, top, right, bottom) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        let points = vec![
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ];
        let area = polygon_area(&points);
        Self {
            bounds: rect,
            points,
            area,
        }
    }
}

/// Finds the outer contours in `mask` and keeps the ones shaped like bubbles.
/// Contours nested inside another shape (holes and anything within them) are
/// ignored.
#[time]
pub fn find_bubble_candidates(mask: &GrayImage, bounds: &BubbleBounds) -> Vec<BubbleCandidate> {
    let contours = find_contours::<i32>(mask);
    let candidates = contours
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(BubbleCandidate::from_contour)
        .filter(|candidate| rect_could_be_bubble(bounds, &candidate.bounds))
        .collect::<Vec<BubbleCandidate>>();

    log::debug!(
        "{} of {} contours look like bubbles",
        candidates.len(),
        contours.len()
    );
    candidates
}

#[cfg(test)]
mod test {
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};

    use super::*;
    use crate::image_utils::{BLACK, WHITE};

    #[test]
    fn test_find_bubble_candidates_filters_by_shape() {
        let mut mask = GrayImage::from_pixel(300, 200, BLACK);
        // filled bubble
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(30, 30), WHITE);
        // outlined bubble with a nested speck that must not be reported
        draw_hollow_rect_mut(&mut mask, Rect::at(60, 10).of_size(30, 30), WHITE);
        draw_hollow_rect_mut(&mut mask, Rect::at(61, 11).of_size(28, 28), WHITE);
        draw_filled_rect_mut(&mut mask, Rect::at(70, 20).of_size(4, 4), WHITE);
        // too small
        draw_filled_rect_mut(&mut mask, Rect::at(110, 10).of_size(10, 10), WHITE);
        // too large
        draw_filled_rect_mut(&mut mask, Rect::at(130, 10).of_size(60, 60), WHITE);
        // too wide
        draw_filled_rect_mut(&mut mask, Rect::at(10, 100).of_size(45, 25), WHITE);

        let mut candidates = find_bubble_candidates(&mask, &BubbleBounds::default());
        candidates.sort_by_key(|c| c.bounds.left());
        let rects = candidates.iter().map(|c| c.bounds).collect::<Vec<Rect>>();
        assert_eq!(
            rects,
            vec![
                Rect::at(10, 10).of_size(30, 30),
                Rect::at(60, 10).of_size(30, 30)
            ]
        );
        // boundary pixel centres enclose a 29x29 square
        assert_eq!(candidates[0].area, 841.0);
    }

    #[test]
    fn test_find_bubble_candidates_on_blank_mask() {
        let mask = GrayImage::from_pixel(50, 50, BLACK);
        assert!(find_bubble_candidates(&mask, &BubbleBounds::default()).is_empty());
    }

    #[test]
    fn test_from_rect() {
        let candidate = BubbleCandidate::from_rect(Rect::at(5, 5).of_size(21, 11));
        assert_eq!(candidate.area, 200.0);
        assert_eq!(candidate.points.len(), 4);
    }
}
