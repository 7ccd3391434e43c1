//! Coordinate translation between window rectangles.
//!
//! Pure affine fallback used when the matching cascade cannot relocate a
//! point perceptually: the recorded point is mapped from the recorded
//! window's rectangle into the current window's rectangle.

use crate::types::WindowRect;

/// Map a recorded point into the current window rectangle. The point is
/// expressed relative to the recorded rect's origin, scaled by the ratio of
/// the rect sizes, and re-anchored at the current rect's origin. Degenerate
/// axes (zero width or height) clamp that axis' scale factor to 1.0, so the
/// translation never fails.
pub fn translate(point: (i32, i32), recorded: WindowRect, current: WindowRect) -> (i32, i32) {
    let (px, py) = point;
    let local_x = (px - recorded.x) as f64;
    let local_y = (py - recorded.y) as f64;

    let sx = if recorded.width == 0 || current.width == 0 {
        1.0
    } else {
        current.width as f64 / recorded.width as f64
    };
    let sy = if recorded.height == 0 || current.height == 0 {
        1.0
    } else {
        current.height as f64 / recorded.height as f64
    };

    let nx = (current.x as f64 + local_x * sx).round() as i32;
    let ny = (current.y as f64 + local_y * sy).round() as i32;
    (nx, ny)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_rects_match() {
        let rect = WindowRect::new(40, 60, 420, 860);
        for point in [(40, 60), (100, 200), (459, 919), (0, 0)] {
            assert_eq!(translate(point, rect, rect), point);
        }
    }

    #[test]
    fn test_double_scale() {
        let recorded = WindowRect::new(0, 0, 400, 800);
        let current = WindowRect::new(0, 0, 800, 1600);
        assert_eq!(translate((100, 200), recorded, current), (200, 400));
    }

    #[test]
    fn test_offset_and_scale() {
        let recorded = WindowRect::new(50, 50, 400, 800);
        let current = WindowRect::new(100, 0, 200, 400);
        // local (50, 150) scaled by 0.5 -> (25, 75), re-anchored at (100, 0)
        assert_eq!(translate((100, 200), recorded, current), (125, 75));
    }

    #[test]
    fn test_invertible_within_rounding() {
        let r1 = WindowRect::new(10, 20, 420, 860);
        let r2 = WindowRect::new(300, 100, 630, 645);
        for point in [(10, 20), (220, 450), (429, 879)] {
            let there = translate(point, r1, r2);
            let back = translate(there, r2, r1);
            assert!((back.0 - point.0).abs() <= 1, "{:?} -> {:?} -> {:?}", point, there, back);
            assert!((back.1 - point.1).abs() <= 1, "{:?} -> {:?} -> {:?}", point, there, back);
        }
    }

    #[test]
    fn test_degenerate_rect_clamps_scale() {
        let degenerate = WindowRect::new(0, 0, 0, 0);
        let current = WindowRect::new(10, 10, 100, 100);
        // Scale clamps to 1.0; only the origin shift applies.
        assert_eq!(translate((5, 7), degenerate, current), (15, 17));

        let recorded = WindowRect::new(0, 0, 100, 100);
        let flat = WindowRect::new(0, 0, 100, 0);
        assert_eq!(translate((50, 50), recorded, flat), (50, 50));
    }
}
