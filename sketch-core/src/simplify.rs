//! # Stroke Simplification
//!
//! Greedy single-pass point reduction followed by a uniform subsampling cap.
//!
//! ```text
//!  raw:     ●─●─●─●──●───●─●─●─●─●
//!  greedy:  ●───●────●───●───────●   keep if far from last kept point
//!                                    or off the line to two points ahead
//!  capped:  ●────────●───────────●   stride = ceil(len / max_points)
//! ```
//!
//! This is not Douglas-Peucker: each decision looks only at the
//! last kept point and the point two positions ahead.

use serde::{Deserialize, Serialize};

use crate::stroke::{Point, Stroke};

/// Tolerance and point cap for one simplification pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyOptions {
    /// Distance in pixels above which a point is kept.
    pub tolerance: f64,
    /// Maximum number of point pairs before subsampling.
    pub max_points: usize,
}

impl SimplifyOptions {
    /// Fine pass used for detail work.
    pub const FINE: Self = Self {
        tolerance: 2.0,
        max_points: 1000,
    };

    /// Coarse pass used for structure extraction.
    pub const COARSE: Self = Self {
        tolerance: 3.0,
        max_points: 500,
    };
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self::FINE
    }
}

/// Simplify a flat `[x0, y0, x1, y1, ...]` point array.
///
/// The first and last pairs are always kept. Arrays with fewer than three
/// pairs are returned unchanged. If more than `max_points` pairs survive the
/// greedy pass they are subsampled with a uniform stride, and the final pair
/// is appended when the stride skips it.
#[must_use]
pub fn simplify_points(points: &[f64], tolerance: f64, max_points: usize) -> Vec<f64> {
    let pts: Vec<Point> = points
        .chunks_exact(2)
        .map(|p| Point::new(p[0], p[1]))
        .collect();

    if pts.len() < 3 {
        return points.to_vec();
    }

    let last_index = pts.len() - 1;
    let mut kept = Vec::with_capacity(pts.len());
    kept.push(pts[0]);
    let mut anchor = pts[0];

    for i in 1..last_index {
        let current = pts[i];
        let ahead = pts[(i + 2).min(last_index)];
        let from_anchor = current.distance(&anchor);
        let off_line = current.distance_to_segment(&anchor, &ahead);
        if from_anchor > tolerance || off_line > tolerance {
            kept.push(current);
            anchor = current;
        }
    }
    kept.push(pts[last_index]);

    let capped = cap_points(kept, max_points);
    capped.iter().flat_map(|p| [p.x, p.y]).collect()
}

fn cap_points(points: Vec<Point>, max_points: usize) -> Vec<Point> {
    let max_points = max_points.max(1);
    if points.len() <= max_points {
        return points;
    }

    let stride = points.len().div_ceil(max_points);
    let last = points.len() - 1;
    let mut sampled: Vec<Point> = points.iter().step_by(stride).copied().collect();
    if last % stride != 0 {
        sampled.push(points[last]);
    }
    sampled
}

impl Stroke {
    /// Simplified copy of this stroke.
    ///
    /// Id, color and width are preserved; the original is untouched.
    #[must_use]
    pub fn simplified(&self, options: SimplifyOptions) -> Self {
        self.with_points(simplify_points(
            self.points(),
            options.tolerance,
            options.max_points,
        ))
    }
}

/// Simplify every stroke in a batch.
#[must_use]
pub fn simplify_strokes(strokes: &[Stroke], options: SimplifyOptions) -> Vec<Stroke> {
    let simplified: Vec<Stroke> = strokes.iter().map(|s| s.simplified(options)).collect();
    let before: usize = strokes.iter().map(Stroke::point_count).sum();
    let after: usize = simplified.iter().map(Stroke::point_count).sum();
    tracing::debug!(
        "Simplified {} strokes: {} -> {} points (tolerance {}, cap {})",
        strokes.len(),
        before,
        after,
        options.tolerance,
        options.max_points
    );
    simplified
}

#[cfg(test)]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(n: usize, step: f64) -> Vec<f64> {
        (0..n).flat_map(|i| [i as f64 * step, 0.0]).collect()
    }

    #[test]
    fn test_short_input_passes_through() {
        let pts = vec![0.0, 0.0, 1.0, 1.0];
        assert_eq!(simplify_points(&pts, 2.0, 500), pts);
        assert_eq!(simplify_points(&[3.0, 4.0], 2.0, 500), vec![3.0, 4.0]);
    }

    #[test]
    fn test_dense_straight_line_collapses() {
        // 0.5px spacing on a straight line: nothing interior is far enough
        let pts = line(21, 0.5);
        let out = simplify_points(&pts, 2.0, 500);
        // Every fifth point is > 2px from the previous kept point
        assert_eq!(&out[..2], &[0.0, 0.0]);
        assert_eq!(&out[out.len() - 2..], &[10.0, 0.0]);
        assert!(out.len() < pts.len());
    }

    #[test]
    fn test_sparse_points_are_kept() {
        let pts = line(5, 10.0);
        assert_eq!(simplify_points(&pts, 2.0, 500), pts);
    }

    #[test]
    fn test_corner_is_kept_by_perpendicular_check() {
        // Small bump at index 2 stays inside the tolerance on both checks
        let pts = vec![0.0, 0.0, 1.0, 0.0, 1.5, 1.0, 2.0, 0.0, 3.0, 0.0];
        let out = simplify_points(&pts, 2.0, 500);
        assert_eq!(out, vec![0.0, 0.0, 3.0, 0.0]);

        let spike = vec![0.0, 0.0, 1.0, 0.0, 1.5, 8.0, 2.0, 0.0, 3.0, 0.0];
        let out = simplify_points(&spike, 2.0, 500);
        assert!(out.chunks_exact(2).any(|p| p == [1.5, 8.0]));
    }

    #[test]
    fn test_cap_forces_last_point() {
        // 10 points, cap 3 -> stride 4 picks 0,4,8 then appends 9
        let pts = line(10, 10.0);
        let out = simplify_points(&pts, 0.0, 3);
        assert_eq!(out, vec![0.0, 0.0, 40.0, 0.0, 80.0, 0.0, 90.0, 0.0]);
    }

    #[test]
    fn test_cap_when_stride_lands_on_last() {
        // 7 points, cap 3 -> stride 3 picks 0,3,6 (6 is last)
        let pts = line(7, 10.0);
        let out = simplify_points(&pts, 0.0, 3);
        assert_eq!(out, vec![0.0, 0.0, 30.0, 0.0, 60.0, 0.0]);
    }

    #[test]
    fn test_stroke_simplified_keeps_identity() {
        let stroke = Stroke::new("s1", line(50, 0.3), "#f00", 4.0).expect("valid");
        let simple = stroke.simplified(SimplifyOptions::COARSE);
        assert_eq!(simple.id, "s1");
        assert_eq!(simple.color, "#f00");
        assert!(simple.point_count() <= stroke.point_count());
        assert_eq!(stroke.point_count(), 50);
    }

    fn arb_points() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0), 1..1500)
            .prop_map(|pairs| pairs.into_iter().flat_map(|(x, y)| [x, y]).collect())
    }

    proptest! {
        #[test]
        fn prop_preserves_endpoints(points in arb_points(), tolerance in 0.0f64..50.0) {
            let out = simplify_points(&points, tolerance, 500);
            prop_assert_eq!(&out[..2], &points[..2]);
            prop_assert_eq!(&out[out.len() - 2..], &points[points.len() - 2..]);
        }

        #[test]
        fn prop_never_grows(points in arb_points(), tolerance in 0.0f64..50.0, max in 1usize..800) {
            let out = simplify_points(&points, tolerance, max);
            prop_assert!(out.len() <= points.len());
            prop_assert_eq!(out.len() % 2, 0);
        }

        #[test]
        fn prop_respects_cap(points in arb_points()) {
            let out = simplify_points(&points, 0.0, 500);
            prop_assert!(out.len() / 2 <= 501);
        }
    }
}
