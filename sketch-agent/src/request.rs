//! Request model sent to the generation service.

use serde::{Deserialize, Serialize};
use sketch_core::{CanvasSize, ElementPosition, GestureDetection, Stroke, StrokePayload};

/// How the service should treat the strokes in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Single call with every stroke.
    Normal,
    /// First stage: extract the overall structure from simplified strokes.
    StructureExtraction,
    /// Second stage: add detail on top of a base diagram.
    DetailAddition,
}

/// JSON body posted to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Strokes to interpret.
    pub strokes: Vec<StrokePayload>,
    /// Diagram text currently displayed.
    pub current_diagram_text: String,
    /// Rendered element boxes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_positions: Option<Vec<ElementPosition>>,
    /// Raster snapshot as a data URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Free-text hint, including detected gestures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Diagram dialect the service should emit.
    pub diagram_variant: String,
    /// Processing mode.
    pub mode: GenerationMode,
    /// Stage number for multi-stage calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<u8>,
    /// Diagram text to extend; present for [`GenerationMode::DetailAddition`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_diagram_text: Option<String>,
}

/// Everything the caller hands over for one interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchInput {
    /// Strokes drawn since the last request, in capture order.
    pub strokes: Vec<Stroke>,
    /// Diagram text currently displayed.
    #[serde(default)]
    pub diagram_text: String,
    /// Element boxes from the renderer.
    #[serde(default)]
    pub element_positions: Option<Vec<ElementPosition>>,
    /// Raster snapshot as a data URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Free-text hint from the user.
    #[serde(default)]
    pub hint: Option<String>,
    /// Size of the drawing surface.
    #[serde(default)]
    pub canvas: CanvasSize,
}

impl SketchInput {
    /// Create an input from strokes and the current diagram text.
    #[must_use]
    pub fn new(strokes: Vec<Stroke>, diagram_text: impl Into<String>) -> Self {
        Self {
            strokes,
            diagram_text: diagram_text.into(),
            ..Self::default()
        }
    }

    /// Attach renderer element positions.
    #[must_use]
    pub fn with_elements(mut self, elements: Vec<ElementPosition>) -> Self {
        self.element_positions = Some(elements);
        self
    }

    /// Attach a user hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach an image data URL.
    #[must_use]
    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image = Some(data_url.into());
        self
    }

    /// Set the canvas size.
    #[must_use]
    pub fn with_canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = canvas;
        self
    }
}

/// Combine the user hint with gesture descriptions.
///
/// Returns `None` when there is neither.
#[must_use]
pub fn compose_hint(user_hint: Option<&str>, gestures: &[GestureDetection]) -> Option<String> {
    let mut lines: Vec<String> = user_hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .into_iter()
        .collect();
    if !gestures.is_empty() {
        lines.push("Detected gestures:".to_string());
        lines.extend(gestures.iter().map(|g| format!("- {}", g.describe())));
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Builds requests that share the per-invocation context.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext<'a> {
    pub input: &'a SketchInput,
    pub hint: Option<String>,
    pub diagram_variant: &'a str,
}

impl RequestContext<'_> {
    pub fn build<'s, I>(
        &self,
        strokes: I,
        mode: GenerationMode,
        stage: Option<u8>,
        base_diagram_text: Option<&str>,
    ) -> GenerationRequest
    where
        I: IntoIterator<Item = &'s Stroke>,
    {
        GenerationRequest {
            strokes: strokes.into_iter().map(StrokePayload::from).collect(),
            current_diagram_text: self.input.diagram_text.clone(),
            element_positions: self.input.element_positions.clone(),
            image: self.input.image.clone(),
            hint: self.hint.clone(),
            diagram_variant: self.diagram_variant.to_string(),
            mode,
            stage,
            base_diagram_text: base_diagram_text.map(str::to_string),
        }
    }
}
