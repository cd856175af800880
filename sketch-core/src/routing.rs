//! Payload size estimation and single- vs multi-stage routing.

use serde::{Deserialize, Serialize};

use crate::stroke::Stroke;
use crate::{CoreError, CoreResult};

/// Default stroke count above which the multi-stage path is taken.
pub const DEFAULT_MAX_STROKES: usize = 50;
/// Default byte size above which the multi-stage path is taken (900KB).
///
/// The same value is the hard ceiling for a post-simplification payload.
pub const DEFAULT_MAX_BYTES: usize = 900 * 1024;

/// Routing thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Stroke count threshold.
    pub max_strokes: usize,
    /// Serialized byte size threshold and hard ceiling.
    pub max_bytes: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_strokes: DEFAULT_MAX_STROKES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// The wire form of a stroke, as sent to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePayload {
    /// Stroke id.
    pub id: String,
    /// Flat point array.
    pub points: Vec<f64>,
    /// Stroke color.
    pub color: String,
    /// Stroke width in pixels.
    pub stroke_width: f64,
}

impl From<&Stroke> for StrokePayload {
    fn from(stroke: &Stroke) -> Self {
        Self {
            id: stroke.id.clone(),
            points: stroke.points().to_vec(),
            color: stroke.color.clone(),
            stroke_width: stroke.width,
        }
    }
}

/// Estimate the UTF-8 byte length of the strokes' wire encoding.
#[must_use]
pub fn estimate_payload_bytes<'a, I>(strokes: I) -> usize
where
    I: IntoIterator<Item = &'a Stroke>,
{
    let payload: Vec<StrokePayload> = strokes.into_iter().map(StrokePayload::from).collect();
    // Serializing plain numbers and strings cannot fail
    serde_json::to_vec(&payload).map_or(0, |bytes| bytes.len())
}

/// Decides whether a stroke batch fits a single generation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadRouter {
    config: RoutingConfig,
}

impl PayloadRouter {
    /// Create a router with the given thresholds.
    #[must_use]
    pub const fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Current thresholds.
    #[must_use]
    pub const fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Whether the batch needs the multi-stage path.
    #[must_use]
    pub fn should_use_multi_stage(&self, strokes: &[Stroke]) -> bool {
        let count = strokes.len();
        let bytes = estimate_payload_bytes(strokes);
        let multi = count > self.config.max_strokes || bytes > self.config.max_bytes;
        tracing::debug!(
            "Routing {} strokes ({} bytes): {}",
            count,
            bytes,
            if multi { "multi-stage" } else { "single-stage" }
        );
        multi
    }

    /// Whether the batch is under the byte threshold.
    #[must_use]
    pub fn fits_size(&self, strokes: &[Stroke]) -> bool {
        estimate_payload_bytes(strokes) <= self.config.max_bytes
    }

    /// Reject a payload that exceeds the hard ceiling.
    ///
    /// Returns the estimated size on success.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PayloadTooLarge`] when the estimate exceeds
    /// `max_bytes`.
    pub fn check_ceiling<'a, I>(&self, strokes: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = &'a Stroke>,
    {
        let size = estimate_payload_bytes(strokes);
        if size > self.config.max_bytes {
            return Err(CoreError::PayloadTooLarge {
                size,
                limit: self.config.max_bytes,
            });
        }
        Ok(size)
    }
}
