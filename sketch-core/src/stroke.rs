//! Strokes and the geometry primitives derived from them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Distance from this point to the segment `a`-`b`.
    ///
    /// A zero-length segment degrades to the distance to `a`.
    #[must_use]
    pub fn distance_to_segment(&self, a: &Self, b: &Self) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.distance(a);
        }
        let t = (((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
        self.distance(&Self::new(a.x + t * dx, a.y + t * dy))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub min_x: f64,
    /// Top edge.
    pub min_y: f64,
    /// Right edge.
    pub max_x: f64,
    /// Bottom edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty set.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// The larger of width and height.
    #[must_use]
    pub fn size(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Grow the box by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Check if a point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }
}

/// One continuous pointer drag.
///
/// Points are stored flat as `[x0, y0, x1, y1, ...]`, which is also the wire
/// format. The array always has an even length of at least 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStroke")]
pub struct Stroke {
    /// Stroke identifier assigned on capture.
    pub id: String,
    points: Vec<f64>,
    /// Stroke color (CSS color string).
    pub color: String,
    /// Stroke width in pixels.
    pub width: f64,
}

#[derive(Deserialize)]
struct RawStroke {
    id: String,
    points: Vec<f64>,
    #[serde(default = "default_color")]
    color: String,
    #[serde(default = "default_width", alias = "strokeWidth")]
    width: f64,
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_width() -> f64 {
    2.0
}

impl TryFrom<RawStroke> for Stroke {
    type Error = CoreError;

    fn try_from(raw: RawStroke) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.points, raw.color, raw.width)
    }
}

impl Stroke {
    /// Create a stroke from a flat point array.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidStroke`] if the array is empty, has an odd
    /// length, or contains a non-finite coordinate.
    pub fn new(
        id: impl Into<String>,
        points: Vec<f64>,
        color: impl Into<String>,
        width: f64,
    ) -> CoreResult<Self> {
        let id = id.into();
        if points.len() < 2 {
            return Err(CoreError::InvalidStroke(format!(
                "stroke {id} has no points"
            )));
        }
        if points.len() % 2 != 0 {
            return Err(CoreError::InvalidStroke(format!(
                "stroke {id} has an odd coordinate count ({})",
                points.len()
            )));
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::InvalidStroke(format!(
                "stroke {id} has a non-finite coordinate"
            )));
        }
        Ok(Self {
            id,
            points,
            color: color.into(),
            width,
        })
    }

    /// Create a stroke with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Stroke::new`].
    pub fn with_generated_id(
        points: Vec<f64>,
        color: impl Into<String>,
        width: f64,
    ) -> CoreResult<Self> {
        Self::new(Uuid::new_v4().to_string(), points, color, width)
    }

    /// Flat coordinate array.
    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Number of point pairs.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len() / 2
    }

    /// Iterate over the stroke's points.
    pub fn iter_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.chunks_exact(2).map(|p| Point::new(p[0], p[1]))
    }

    /// First point of the stroke.
    #[must_use]
    pub fn start(&self) -> Point {
        Point::new(self.points[0], self.points[1])
    }

    /// Last point of the stroke.
    #[must_use]
    pub fn end(&self) -> Point {
        let n = self.points.len();
        Point::new(self.points[n - 2], self.points[n - 1])
    }

    /// Whether the stroke is too short for shape analysis.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.point_count() < 2
    }

    /// Bounding box of all points.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        let start = self.start();
        BoundingBox::from_points(self.iter_points()).unwrap_or(BoundingBox {
            min_x: start.x,
            min_y: start.y,
            max_x: start.x,
            max_y: start.y,
        })
    }

    /// Center of the bounding box.
    #[must_use]
    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Copy of this stroke with a different point array.
    ///
    /// The caller guarantees the new array upholds the stroke invariant.
    pub(crate) fn with_points(&self, points: Vec<f64>) -> Self {
        debug_assert!(points.len() >= 2 && points.len() % 2 == 0);
        Self {
            id: self.id.clone(),
            points,
            color: self.color.clone(),
            width: self.width,
        }
    }
}

/// Bounding box and label of a rendered diagram element.
///
/// Supplied by the renderer at request time and never modified here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPosition {
    /// Element identifier in the diagram text.
    pub id: String,
    /// Visible label.
    #[serde(default)]
    pub label: String,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Center X.
    pub center_x: f64,
    /// Center Y.
    pub center_y: f64,
}

impl ElementPosition {
    /// Create an element position, deriving the center from the box.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            x,
            y,
            width,
            height,
            center_x: x + width / 2.0,
            center_y: y + height / 2.0,
        }
    }

    /// Bounding box of the element.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min_x: self.x,
            min_y: self.y,
            max_x: self.x + self.width,
            max_y: self.y + self.height,
        }
    }

    /// Center point of the element.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }
}

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl CanvasSize {
    /// Create a canvas size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}
