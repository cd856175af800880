//! # Saorsa Sketch Core
//!
//! Stroke geometry for turning freehand pen input into diagram edit requests.
//! Nothing in this crate performs I/O; it only derives new collections from
//! immutable stroke batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 sketch-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Strokes         │  Simplifier              │
//! │  - Points        │  - Greedy reduction      │
//! │  - Bounds        │  - Point cap             │
//! ├─────────────────────────────────────────────┤
//! │  Payload Router  │  Gesture Detector        │
//! │  - Size estimate │  - Crossing-out          │
//! │  - Stage choice  │  - Enclosure             │
//! ├─────────────────────────────────────────────┤
//! │  Region Divider                             │
//! │  - Spatial grid / clustering / time batches │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod gesture;
pub mod region;
pub mod routing;
pub mod simplify;
pub mod stroke;

pub use error::{CoreError, CoreResult};
pub use gesture::{
    EnclosureDetection, GestureConfig, GestureDetection, GestureDetector, XMarkDetection,
};
pub use region::{Division, DivisionConfig, DivisionMethod, Region, RegionDivider};
pub use routing::{
    estimate_payload_bytes, PayloadRouter, RoutingConfig, StrokePayload, DEFAULT_MAX_BYTES,
    DEFAULT_MAX_STROKES,
};
pub use simplify::{simplify_points, simplify_strokes, SimplifyOptions};
pub use stroke::{BoundingBox, CanvasSize, ElementPosition, Point, Stroke};

/// Sketch core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
