//! # Stage Orchestration
//!
//! Sequences one to three generation calls for a stroke batch:
//!
//! ```text
//! idle ─┬─> normal ──────────────────────────────> completed
//!       └─> stage1 ─┬─ nothing left ─────────────> completed
//!                   ├─ remainder fits ─> stage2a ─> completed
//!                   └─ remainder large ─> stage2b ─> completed
//!
//! any active state ─ failure ─> error
//! any active state ─ cancel ──> idle
//! ```
//!
//! Stage 2b walks the regions one at a time. Each region builds on the
//! diagram text produced by the previous one, and a failing region is
//! skipped rather than aborting the run.

use serde::{Deserialize, Serialize};
use sketch_core::{
    simplify_strokes, CanvasSize, CoreError, DivisionConfig, GestureConfig, GestureDetector,
    PayloadRouter, RegionDivider, RoutingConfig, SimplifyOptions, Stroke,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::GenerationClient;
use crate::error::OrchestrationError;
use crate::request::{compose_hint, GenerationMode, GenerationRequest, RequestContext, SketchInput};
use crate::stream::{join_traces, DecodedStream, DecoderConfig, StreamDecoder, StreamInterrupt};

/// Visible orchestration state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Single-stage call in flight.
    Normal,
    /// Structure extraction in flight.
    Stage1,
    /// Direct detail addition in flight.
    Stage2a,
    /// Region-by-region detail addition in flight.
    Stage2b,
    /// Last run produced a result.
    Completed,
    /// Last run failed.
    Error,
}

impl ProcessingState {
    /// Whether a run is in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Normal | Self::Stage1 | Self::Stage2a | Self::Stage2b)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Normal => "normal",
            Self::Stage1 => "stage1",
            Self::Stage2a => "stage2a",
            Self::Stage2b => "stage2b",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Parsed output of one stage plus the input strokes it consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Diagram body, if the service produced one.
    pub diagram_text: Option<String>,
    /// Rationale, if the service produced one.
    pub rationale: Option<String>,
    /// Reasoning text.
    pub thinking_trace: String,
    /// Indices into the input batch, ascending.
    pub processed_indices: Vec<usize>,
}

impl StageResult {
    fn from_decoded(decoded: DecodedStream, processed_indices: Vec<usize>) -> Self {
        Self {
            diagram_text: decoded.diagram_text,
            rationale: decoded.rationale,
            thinking_trace: decoded.thinking,
            processed_indices,
        }
    }
}

/// Final result handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Diagram body.
    pub diagram_text: Option<String>,
    /// Rationale.
    pub rationale: Option<String>,
    /// Reasoning from every stage.
    pub thinking_trace: String,
}

impl From<StageResult> for GenerationResult {
    fn from(stage: StageResult) -> Self {
        Self {
            diagram_text: stage.diagram_text,
            rationale: stage.rationale,
            thinking_trace: stage.thinking_trace,
        }
    }
}

/// Partial result delivered once stage 1 finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateResult {
    /// Diagram body from stage 1.
    pub diagram_text: Option<String>,
    /// Rationale from stage 1.
    pub rationale: Option<String>,
}

/// How a run ended without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The run finished.
    Completed(GenerationResult),
    /// The run was cancelled; nothing to report.
    Cancelled,
}

/// Which strokes stage 1 sends and marks as processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage1Coverage {
    /// Every stroke; nothing is left for stage 2.
    #[default]
    AllStrokes,
    /// Only the first `n` strokes; the rest go to stage 2.
    Leading(usize),
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Simplification applied to stage 2 payloads.
    pub fine: SimplifyOptions,
    /// Simplification applied to the stage 1 payload.
    pub coarse: SimplifyOptions,
    /// Stage routing thresholds and payload ceiling.
    pub routing: RoutingConfig,
    /// Region division tuning.
    pub division: DivisionConfig,
    /// Gesture thresholds.
    pub gestures: GestureConfig,
    /// Stream framing.
    pub decoder: DecoderConfig,
    /// Diagram dialect requested from the service.
    pub diagram_variant: String,
    /// Stage 1 coverage.
    pub stage1_coverage: Stage1Coverage,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fine: SimplifyOptions::FINE,
            coarse: SimplifyOptions::COARSE,
            routing: RoutingConfig::default(),
            division: DivisionConfig::default(),
            gestures: GestureConfig::default(),
            decoder: DecoderConfig::default(),
            diagram_variant: "flowchart".to_string(),
            stage1_coverage: Stage1Coverage::AllStrokes,
        }
    }
}

type IntermediateHook = Box<dyn Fn(&IntermediateResult) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&GenerationResult) + Send + Sync>;

/// Optional caller callbacks.
#[derive(Default)]
pub struct StageHooks {
    on_intermediate: Option<IntermediateHook>,
    on_complete: Option<CompleteHook>,
}

impl StageHooks {
    /// No callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once after stage 1, before stage 2 starts.
    #[must_use]
    pub fn on_intermediate<F>(mut self, f: F) -> Self
    where
        F: Fn(&IntermediateResult) + Send + Sync + 'static,
    {
        self.on_intermediate = Some(Box::new(f));
        self
    }

    /// Called when a run completes. Never called on cancellation or failure.
    #[must_use]
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&GenerationResult) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    fn intermediate(&self, result: &IntermediateResult) {
        if let Some(hook) = &self.on_intermediate {
            hook(result);
        }
    }

    fn complete(&self, result: &GenerationResult) {
        if let Some(hook) = &self.on_complete {
            hook(result);
        }
    }
}

impl std::fmt::Debug for StageHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageHooks")
            .field("on_intermediate", &self.on_intermediate.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Runs the staged generation state machine against a [`GenerationClient`].
pub struct StageOrchestrator<C> {
    client: C,
    config: OrchestratorConfig,
    router: PayloadRouter,
    divider: RegionDivider,
    detector: GestureDetector,
    decoder: StreamDecoder,
    state: watch::Sender<ProcessingState>,
}

impl<C: GenerationClient> StageOrchestrator<C> {
    /// Create an orchestrator with default tuning.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    /// Create an orchestrator with custom tuning.
    #[must_use]
    pub fn with_config(client: C, config: OrchestratorConfig) -> Self {
        let (state, _) = watch::channel(ProcessingState::Idle);
        Self {
            client,
            router: PayloadRouter::new(config.routing),
            divider: RegionDivider::new(config.division, config.routing),
            detector: GestureDetector::new(config.gestures),
            decoder: StreamDecoder::new(config.decoder.clone()),
            config,
            state,
        }
    }

    /// Current tuning.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProcessingState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ProcessingState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("Processing state: {} -> {}", prev, next);
        }
    }

    /// Interpret one stroke batch.
    ///
    /// Returns [`Outcome::Cancelled`] if `cancel` fires at any point; the
    /// state then returns to [`ProcessingState::Idle`] and no hook runs.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError`] for rejected input or an aborted stage,
    /// carrying whatever reasoning was received before the failure.
    pub async fn run(
        &self,
        input: &SketchInput,
        cancel: &CancellationToken,
        hooks: &StageHooks,
    ) -> Result<Outcome, OrchestrationError> {
        match self.execute(input, cancel, hooks).await {
            Ok(_) if cancel.is_cancelled() => Ok(self.cancelled()),
            Ok(stage) => {
                let result = GenerationResult::from(stage);
                self.set_state(ProcessingState::Completed);
                info!(
                    "Generation completed (diagram: {}, rationale: {})",
                    result.diagram_text.is_some(),
                    result.rationale.is_some()
                );
                hooks.complete(&result);
                Ok(Outcome::Completed(result))
            }
            Err(StreamInterrupt::Cancelled) => Ok(self.cancelled()),
            Err(StreamInterrupt::Failed { error, thinking }) => {
                error!("Generation failed: {}", error);
                self.set_state(ProcessingState::Error);
                Err(OrchestrationError {
                    error,
                    thinking_trace: thinking,
                })
            }
        }
    }

    fn cancelled(&self) -> Outcome {
        info!("Generation cancelled");
        self.set_state(ProcessingState::Idle);
        Outcome::Cancelled
    }

    async fn execute(
        &self,
        input: &SketchInput,
        cancel: &CancellationToken,
        hooks: &StageHooks,
    ) -> Result<StageResult, StreamInterrupt> {
        if input.strokes.is_empty() {
            return Err(CoreError::EmptyInput.into());
        }
        if cancel.is_cancelled() {
            return Err(StreamInterrupt::Cancelled);
        }

        let gestures = self
            .detector
            .detect_all(&input.strokes, input.element_positions.as_deref());
        for gesture in &gestures {
            debug!("Gesture: {}", gesture.describe());
        }
        let ctx = RequestContext {
            input,
            hint: compose_hint(input.hint.as_deref(), &gestures),
            diagram_variant: &self.config.diagram_variant,
        };

        if self.router.should_use_multi_stage(&input.strokes) {
            self.run_staged(&ctx, cancel, hooks).await
        } else {
            self.run_normal(&ctx, cancel).await
        }
    }

    async fn run_normal(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StageResult, StreamInterrupt> {
        let strokes = &ctx.input.strokes;
        info!("Single-stage generation with {} strokes", strokes.len());
        self.set_state(ProcessingState::Normal);

        let request = ctx.build(strokes, GenerationMode::Normal, None, None);
        let decoded = self.call(&request, cancel).await?;
        Ok(StageResult::from_decoded(decoded, (0..strokes.len()).collect()))
    }

    async fn run_staged(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        hooks: &StageHooks,
    ) -> Result<StageResult, StreamInterrupt> {
        let strokes = &ctx.input.strokes;
        let covered = match self.config.stage1_coverage {
            Stage1Coverage::AllStrokes => strokes.len(),
            Stage1Coverage::Leading(n) => n.clamp(1, strokes.len()),
        };

        let coarse = simplify_strokes(&strokes[..covered], self.config.coarse);
        self.router.check_ceiling(&coarse)?;

        info!(
            "Stage 1: structure extraction over {} of {} strokes",
            covered,
            strokes.len()
        );
        self.set_state(ProcessingState::Stage1);
        let request = ctx.build(&coarse, GenerationMode::StructureExtraction, Some(1), None);
        let decoded = self.call(&request, cancel).await?;
        let stage1 = StageResult::from_decoded(decoded, (0..covered).collect());

        hooks.intermediate(&IntermediateResult {
            diagram_text: stage1.diagram_text.clone(),
            rationale: stage1.rationale.clone(),
        });

        let mut consumed = vec![false; strokes.len()];
        for &i in &stage1.processed_indices {
            consumed[i] = true;
        }
        let remaining: Vec<usize> = (0..strokes.len()).filter(|&i| !consumed[i]).collect();
        if remaining.is_empty() {
            debug!("Stage 1 consumed every stroke");
            return Ok(stage1);
        }

        let rest: Vec<Stroke> = remaining.iter().map(|&i| strokes[i].clone()).collect();
        let prior_trace = stage1.thinking_trace.clone();
        let result = if self.router.fits_size(&rest) {
            self.run_stage2a(ctx, stage1, &rest, &remaining, cancel).await
        } else {
            self.run_stage2b(ctx, stage1, &rest, &remaining, cancel).await
        };
        result.map_err(|interrupt| interrupt.after_trace(&prior_trace))
    }

    async fn run_stage2a(
        &self,
        ctx: &RequestContext<'_>,
        stage1: StageResult,
        rest: &[Stroke],
        remaining: &[usize],
        cancel: &CancellationToken,
    ) -> Result<StageResult, StreamInterrupt> {
        info!("Stage 2a: adding {} remaining strokes", rest.len());
        self.set_state(ProcessingState::Stage2a);

        let fine = simplify_strokes(rest, self.config.fine);
        let base = stage1
            .diagram_text
            .as_deref()
            .unwrap_or(&ctx.input.diagram_text);
        let request = ctx.build(&fine, GenerationMode::DetailAddition, Some(2), Some(base));
        let decoded = self.call(&request, cancel).await?;

        let mut processed = stage1.processed_indices;
        processed.extend_from_slice(remaining);
        processed.sort_unstable();
        Ok(StageResult {
            diagram_text: decoded.diagram_text.or(stage1.diagram_text),
            rationale: decoded.rationale.or(stage1.rationale),
            thinking_trace: join_traces(&stage1.thinking_trace, &decoded.thinking),
            processed_indices: processed,
        })
    }

    async fn run_stage2b(
        &self,
        ctx: &RequestContext<'_>,
        stage1: StageResult,
        rest: &[Stroke],
        remaining: &[usize],
        cancel: &CancellationToken,
    ) -> Result<StageResult, StreamInterrupt> {
        let canvas: CanvasSize = ctx.input.canvas;
        let division = self.divider.divide_optimally(rest, canvas);
        let total = division.regions.len();
        info!(
            "Stage 2b: {} remaining strokes in {} regions ({} division)",
            rest.len(),
            total,
            division.method
        );
        self.set_state(ProcessingState::Stage2b);

        let mut current = stage1
            .diagram_text
            .clone()
            .unwrap_or_else(|| ctx.input.diagram_text.clone());
        let mut trace = stage1.thinking_trace;
        let mut processed = stage1.processed_indices;
        let mut succeeded = 0;

        for (n, region) in division.regions.iter().enumerate() {
            let region_strokes: Vec<Stroke> = region
                .strokes(rest)
                .into_iter()
                .map(|s| s.simplified(self.config.fine))
                .collect();
            debug!("Region {}/{}: {} strokes", n + 1, total, region_strokes.len());

            let attempt = match self.router.check_ceiling(&region_strokes) {
                Ok(_) => {
                    let request = ctx.build(
                        &region_strokes,
                        GenerationMode::DetailAddition,
                        Some(2),
                        Some(&current),
                    );
                    self.call(&request, cancel).await
                }
                Err(e) => Err(e.into()),
            };

            match attempt {
                Ok(decoded) => {
                    if let Some(text) = decoded.diagram_text {
                        current = text;
                    }
                    trace = join_traces(&trace, &decoded.thinking);
                    processed.extend(region.indices().iter().map(|&i| remaining[i]));
                    succeeded += 1;
                }
                Err(StreamInterrupt::Cancelled) => return Err(StreamInterrupt::Cancelled),
                Err(StreamInterrupt::Failed { error, .. }) => {
                    warn!(
                        "Region {}/{} failed, keeping previous diagram: {}",
                        n + 1,
                        total,
                        error
                    );
                }
            }
        }

        processed.sort_unstable();
        Ok(StageResult {
            diagram_text: Some(current),
            rationale: Some(format!(
                "Processed {succeeded}/{total} regions using {} division",
                division.method
            )),
            thinking_trace: trace,
            processed_indices: processed,
        })
    }

    /// One generation call: open the stream and decode it, racing `cancel`.
    async fn call(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<DecodedStream, StreamInterrupt> {
        if cancel.is_cancelled() {
            return Err(StreamInterrupt::Cancelled);
        }
        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamInterrupt::Cancelled),
            opened = self.client.generate(request) => opened?,
        };
        let decoded = self.decoder.decode(stream, cancel).await?;
        if cancel.is_cancelled() {
            return Err(StreamInterrupt::Cancelled);
        }
        Ok(decoded)
    }
}

#[cfg(test)]
#[allow(clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned bodies and records every request.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, AgentError>>>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl GenerationClient for Scripted {
        async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, AgentError> {
            self.seen.lock().expect("lock").push(request.clone());
            let reply = self
                .replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::upstream("no scripted reply")));
            let body = reply?;
            Ok(futures::stream::iter(vec![Ok(body.into_bytes())]).boxed())
        }
    }

    fn body(thinking: &str, diagram: &str) -> Result<String, AgentError> {
        let delta = serde_json::json!({
            "type": "text-delta",
            "text": format!("<diagram>{diagram}</diagram><rationale>r-{diagram}</rationale>")
        });
        let reasoning = serde_json::json!({"type": "reasoning", "text": thinking});
        Ok(format!("data: {reasoning}\ndata: {delta}\ndata: [DONE]\n"))
    }

    fn strokes(n: usize) -> Vec<Stroke> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 10.0;
                Stroke::new(format!("s{i}"), vec![x, 0.0, x + 5.0, 5.0], "#000", 2.0)
                    .expect("valid")
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let client = Scripted::new(vec![]);
        let orch = StageOrchestrator::new(client.clone());
        let err = orch
            .run(&SketchInput::default(), &CancellationToken::new(), &StageHooks::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err.error, AgentError::Core(CoreError::EmptyInput)));
        assert!(client.requests().is_empty());
        assert_eq!(orch.state(), ProcessingState::Error);
    }

    #[tokio::test]
    async fn small_batch_takes_normal_path() {
        let client = Scripted::new(vec![body("t", "graph TD")]);
        let orch = StageOrchestrator::new(client.clone());
        let input = SketchInput::new(strokes(3), "old");
        let outcome = orch
            .run(&input, &CancellationToken::new(), &StageHooks::new())
            .await
            .expect("run");
        let Outcome::Completed(result) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.diagram_text.as_deref(), Some("graph TD"));
        assert_eq!(result.rationale.as_deref(), Some("r-graph TD"));
        assert_eq!(result.thinking_trace, "t");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].mode, GenerationMode::Normal);
        assert_eq!(requests[0].strokes.len(), 3);
        assert_eq!(orch.state(), ProcessingState::Completed);
    }

    #[tokio::test]
    async fn oversized_stage1_payload_is_rejected() {
        let client = Scripted::new(vec![]);
        let config = OrchestratorConfig {
            routing: RoutingConfig {
                max_strokes: 2,
                max_bytes: 64,
            },
            ..OrchestratorConfig::default()
        };
        let orch = StageOrchestrator::with_config(client.clone(), config);
        let err = orch
            .run(
                &SketchInput::new(strokes(10), ""),
                &CancellationToken::new(),
                &StageHooks::new(),
            )
            .await
            .expect_err("too large");
        assert!(matches!(
            err.error,
            AgentError::Core(CoreError::PayloadTooLarge { .. })
        ));
        assert!(err.error.is_preflight());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn stage2a_merges_with_stage1() {
        let client = Scripted::new(vec![body("one", "base"), body("two", "detailed")]);
        let config = OrchestratorConfig {
            routing: RoutingConfig {
                max_strokes: 5,
                ..RoutingConfig::default()
            },
            stage1_coverage: Stage1Coverage::Leading(4),
            ..OrchestratorConfig::default()
        };
        let orch = StageOrchestrator::with_config(client.clone(), config);
        let outcome = orch
            .run(
                &SketchInput::new(strokes(8), "old"),
                &CancellationToken::new(),
                &StageHooks::new(),
            )
            .await
            .expect("run");
        let Outcome::Completed(result) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.diagram_text.as_deref(), Some("detailed"));
        assert_eq!(result.thinking_trace, "one\n\ntwo");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].mode, GenerationMode::StructureExtraction);
        assert_eq!(requests[0].stage, Some(1));
        assert_eq!(requests[0].strokes.len(), 4);
        assert_eq!(requests[1].mode, GenerationMode::DetailAddition);
        assert_eq!(requests[1].base_diagram_text.as_deref(), Some("base"));
        assert_eq!(requests[1].strokes[0].id, "s4");
    }

    #[tokio::test]
    async fn stage2a_failure_carries_both_traces() {
        let client = Scripted::new(vec![
            body("one", "base"),
            Ok("data: {\"type\":\"reasoning\",\"text\":\"half\"}\ndata: {\"type\":\"error\",\"error\":\"quota\"}\n".to_string()),
        ]);
        let config = OrchestratorConfig {
            routing: RoutingConfig {
                max_strokes: 5,
                ..RoutingConfig::default()
            },
            stage1_coverage: Stage1Coverage::Leading(4),
            ..OrchestratorConfig::default()
        };
        let orch = StageOrchestrator::with_config(client, config);
        let err = orch
            .run(
                &SketchInput::new(strokes(8), "old"),
                &CancellationToken::new(),
                &StageHooks::new(),
            )
            .await
            .expect_err("should fail");
        assert_eq!(err.thinking_trace, "one\n\nhalf");
        assert!(err.message().contains("quota"));
        assert_eq!(orch.state(), ProcessingState::Error);
    }

    #[test]
    fn state_display_and_activity() {
        assert_eq!(ProcessingState::Stage2b.to_string(), "stage2b");
        assert!(ProcessingState::Stage1.is_active());
        assert!(!ProcessingState::Completed.is_active());
        assert!(!ProcessingState::Idle.is_active());
    }
}
