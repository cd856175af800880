//! # Saorsa Sketch Agent
//!
//! Turns a batch of freehand strokes into diagram edits by calling a
//! streaming generation service. Small batches go out in one call; large
//! ones are reduced to structure first and then filled in stage by stage.
//!
//! ```text
//! SketchSession ── at most one run ──> StageOrchestrator
//!                                        │  PayloadRouter / GestureDetector
//!                                        │  StrokeSimplifier / RegionDivider
//!                                        ▼
//!                                  GenerationClient ──> StreamDecoder
//! ```
//!
//! This library is used by both the binary and integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod request;
pub mod session;
pub mod stream;

pub use client::{ByteStream, ClientDescriptor, GenerationClient, HttpGenerationClient};
pub use config::{AgentConfig, CliArgs, ConfigError, InputFiles};
pub use error::{AgentError, FailureReport, OrchestrationError};
pub use orchestrator::{
    GenerationResult, IntermediateResult, OrchestratorConfig, Outcome, ProcessingState,
    Stage1Coverage, StageHooks, StageOrchestrator, StageResult,
};
pub use request::{compose_hint, GenerationMode, GenerationRequest, SketchInput};
pub use session::SketchSession;
pub use stream::{
    DecodedStream, DecoderConfig, LineParse, StreamAccumulator, StreamDecoder, StreamEvent,
    StreamInterrupt,
};
