//! # Gesture Detection
//!
//! Pure-geometry recognition of two hand-drawn edit gestures:
//!
//! ```text
//!   Crossing-out (delete)          Enclosing (group)
//!
//!     ╲   ╱                         ╭───────────╮
//!      ╲ ╱     two diagonal         │  [A]  [B] │   closed loop around
//!       ╳      strokes, similar     │           │   element centers
//!      ╱ ╲     size, close centers  ╰──────────╮╯
//!     ╱   ╲
//! ```
//!
//! Detections are attached to outbound requests as hints; they never edit
//! the diagram themselves.

use serde::{Deserialize, Serialize};

use crate::stroke::{BoundingBox, ElementPosition, Point, Stroke};

/// Thresholds for gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Maximum distance between the two stroke centers of an X.
    pub xmark_max_center_distance: f64,
    /// Maximum relative size difference between the two strokes of an X.
    pub xmark_max_size_ratio: f64,
    /// Minimum horizontal and vertical travel for a diagonal stroke.
    pub xmark_min_diagonal_extent: f64,
    /// Margin added around element boxes when resolving the X target.
    pub xmark_target_margin: f64,
    /// Maximum gap between the ends of a closed stroke.
    pub enclosure_max_gap: f64,
    /// Minimum width and height of an enclosing stroke.
    pub enclosure_min_extent: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            xmark_max_center_distance: 80.0,
            xmark_max_size_ratio: 0.5,
            xmark_min_diagonal_extent: 20.0,
            xmark_target_margin: 20.0,
            enclosure_max_gap: 50.0,
            enclosure_min_extent: 100.0,
        }
    }
}

/// A crossing-out gesture over (possibly) one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XMarkDetection {
    /// Gesture center X.
    pub center_x: f64,
    /// Gesture center Y.
    pub center_y: f64,
    /// Element under the gesture, if any.
    pub target_element_id: Option<String>,
}

/// A closed loop drawn around one or more elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclosureDetection {
    /// Bounding box of the enclosing stroke.
    pub bounds: BoundingBox,
    /// Elements whose centers lie inside the loop.
    pub enclosed_element_ids: Vec<String>,
}

/// Any recognized gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "camelCase")]
pub enum GestureDetection {
    /// Delete intent.
    XMark(XMarkDetection),
    /// Group intent.
    Enclosure(EnclosureDetection),
}

impl GestureDetection {
    /// One-line description suitable for a generation hint.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::XMark(x) => match &x.target_element_id {
                Some(id) => format!(
                    "An X mark was drawn over element \"{id}\" at ({:.0}, {:.0}); the user likely wants to delete it.",
                    x.center_x, x.center_y
                ),
                None => format!(
                    "An X mark was drawn at ({:.0}, {:.0}) but not over any element.",
                    x.center_x, x.center_y
                ),
            },
            Self::Enclosure(e) => format!(
                "A closed loop was drawn around elements [{}]; the user likely wants to group them.",
                e.enclosed_element_ids.join(", ")
            ),
        }
    }
}

/// Stateless gesture recognizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureDetector {
    config: GestureConfig,
}

impl GestureDetector {
    /// Create a detector with custom thresholds.
    #[must_use]
    pub const fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    /// Current thresholds.
    #[must_use]
    pub const fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Check whether the last two strokes form a crossing-out.
    #[must_use]
    pub fn detect_xmark(
        &self,
        strokes: &[Stroke],
        elements: Option<&[ElementPosition]>,
    ) -> Option<XMarkDetection> {
        let [first, second] = strokes.get(strokes.len().checked_sub(2)?..)? else {
            return None;
        };
        if first.is_degenerate() || second.is_degenerate() {
            return None;
        }

        let (b1, b2) = (first.bounds(), second.bounds());
        let (c1, c2) = (b1.center(), b2.center());
        if c1.distance(&c2) >= self.config.xmark_max_center_distance {
            return None;
        }

        let (s1, s2) = (b1.size(), b2.size());
        let largest = s1.max(s2);
        let size_diff = if largest > 0.0 {
            (s1 - s2).abs() / largest
        } else {
            0.0
        };
        if size_diff >= self.config.xmark_max_size_ratio {
            return None;
        }

        if !self.is_diagonal(first) || !self.is_diagonal(second) {
            return None;
        }

        let center = Point::new((c1.x + c2.x) / 2.0, (c1.y + c2.y) / 2.0);
        let target_element_id = elements.and_then(|els| {
            els.iter()
                .find(|el| {
                    el.bounds()
                        .expanded(self.config.xmark_target_margin)
                        .contains(center)
                })
                .map(|el| el.id.clone())
        });

        tracing::debug!(
            "X mark at ({:.1}, {:.1}) targeting {:?}",
            center.x,
            center.y,
            target_element_id
        );

        Some(XMarkDetection {
            center_x: center.x,
            center_y: center.y,
            target_element_id,
        })
    }

    fn is_diagonal(&self, stroke: &Stroke) -> bool {
        let (start, end) = (stroke.start(), stroke.end());
        let min = self.config.xmark_min_diagonal_extent;
        (end.x - start.x).abs() > min && (end.y - start.y).abs() > min
    }

    /// Find the first closed stroke that encloses at least one element center.
    #[must_use]
    pub fn detect_enclosure(
        &self,
        strokes: &[Stroke],
        elements: Option<&[ElementPosition]>,
    ) -> Option<EnclosureDetection> {
        let elements = elements?;
        if elements.is_empty() {
            return None;
        }

        strokes
            .iter()
            .filter(|s| self.is_enclosing_shape(s))
            .find_map(|stroke| {
                let polygon: Vec<Point> = stroke.iter_points().collect();
                let enclosed: Vec<String> = elements
                    .iter()
                    .filter(|el| point_in_polygon(el.center(), &polygon))
                    .map(|el| el.id.clone())
                    .collect();
                if enclosed.is_empty() {
                    return None;
                }
                tracing::debug!(
                    "Stroke {} encloses {} elements",
                    stroke.id,
                    enclosed.len()
                );
                Some(EnclosureDetection {
                    bounds: stroke.bounds(),
                    enclosed_element_ids: enclosed,
                })
            })
    }

    fn is_enclosing_shape(&self, stroke: &Stroke) -> bool {
        if stroke.point_count() < 3 {
            return false;
        }
        if stroke.start().distance(&stroke.end()) > self.config.enclosure_max_gap {
            return false;
        }
        let b = stroke.bounds();
        b.width() >= self.config.enclosure_min_extent && b.height() >= self.config.enclosure_min_extent
    }

    /// Run every detector and collect the hits.
    #[must_use]
    pub fn detect_all(
        &self,
        strokes: &[Stroke],
        elements: Option<&[ElementPosition]>,
    ) -> Vec<GestureDetection> {
        let mut found = Vec::new();
        if let Some(x) = self.detect_xmark(strokes, elements) {
            found.push(GestureDetection::XMark(x));
        }
        if let Some(e) = self.detect_enclosure(strokes, elements) {
            found.push(GestureDetection::Enclosure(e));
        }
        found
    }
}

/// Even-odd ray casting test.
fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for (i, pi) in polygon.iter().enumerate() {
        let pj = polygon[j];
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
