//! Command-line configuration and input loading.

use std::path::{Path, PathBuf};

use base64::Engine;
use clap::Parser;
use sketch_core::{CanvasSize, ElementPosition, RoutingConfig, Stroke, DEFAULT_MAX_BYTES, DEFAULT_MAX_STROKES};
use thiserror::Error;

use crate::orchestrator::{OrchestratorConfig, Stage1Coverage};
use crate::request::SketchInput;
use crate::stream::DecoderConfig;

/// Errors raised while reading input files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A file did not contain the expected JSON.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Interpret freehand strokes into diagram edits.
#[derive(Debug, Clone, Parser)]
#[command(name = "sketch-agent", version, about)]
pub struct CliArgs {
    /// Generation service URL (a bare host gets `/api/generate`).
    #[arg(long, env = "SKETCH_GENERATE_URL")]
    pub endpoint: String,

    /// JSON file holding the stroke array.
    #[arg(long)]
    pub strokes: PathBuf,

    /// Text file holding the current diagram.
    #[arg(long)]
    pub diagram: Option<PathBuf>,

    /// JSON file holding rendered element positions.
    #[arg(long)]
    pub elements: Option<PathBuf>,

    /// PNG snapshot of the canvas.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Free-text hint passed to the service.
    #[arg(long)]
    pub hint: Option<String>,

    /// Diagram dialect to request.
    #[arg(long, default_value = "flowchart")]
    pub variant: String,

    /// Canvas width in pixels.
    #[arg(long, default_value_t = 800.0)]
    pub canvas_width: f64,

    /// Canvas height in pixels.
    #[arg(long, default_value_t = 600.0)]
    pub canvas_height: f64,

    /// Stroke count above which the staged path is used.
    #[arg(long, default_value_t = DEFAULT_MAX_STROKES)]
    pub max_strokes: usize,

    /// Payload size above which the staged path is used; also the hard limit.
    #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: usize,

    /// Send only the first N strokes to stage 1.
    #[arg(long)]
    pub stage1_strokes: Option<usize>,

    /// Fail on malformed stream lines instead of skipping them.
    #[arg(long)]
    pub strict_stream: bool,
}

/// Input file locations.
#[derive(Debug, Clone, Default)]
pub struct InputFiles {
    /// Stroke array.
    pub strokes: PathBuf,
    /// Current diagram text.
    pub diagram: Option<PathBuf>,
    /// Element positions.
    pub elements: Option<PathBuf>,
    /// Canvas snapshot.
    pub image: Option<PathBuf>,
}

/// Resolved agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Generation service URL.
    pub endpoint: String,
    /// Where to read the input from.
    pub inputs: InputFiles,
    /// User hint.
    pub hint: Option<String>,
    /// Canvas size.
    pub canvas: CanvasSize,
    /// Orchestrator tuning.
    pub orchestrator: OrchestratorConfig,
}

impl From<CliArgs> for AgentConfig {
    fn from(args: CliArgs) -> Self {
        let orchestrator = OrchestratorConfig {
            routing: RoutingConfig {
                max_strokes: args.max_strokes,
                max_bytes: args.max_bytes,
            },
            decoder: DecoderConfig {
                strict: args.strict_stream,
                ..DecoderConfig::default()
            },
            diagram_variant: args.variant,
            stage1_coverage: args
                .stage1_strokes
                .map_or(Stage1Coverage::AllStrokes, Stage1Coverage::Leading),
            ..OrchestratorConfig::default()
        };
        Self {
            endpoint: args.endpoint,
            inputs: InputFiles {
                strokes: args.strokes,
                diagram: args.diagram,
                elements: args.elements,
                image: args.image,
            },
            hint: args.hint,
            canvas: CanvasSize::new(args.canvas_width, args.canvas_height),
            orchestrator,
        }
    }
}

impl AgentConfig {
    /// Read every input file into a [`SketchInput`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file is missing or malformed.
    pub fn load_input(&self) -> Result<SketchInput, ConfigError> {
        let strokes: Vec<Stroke> = read_json(&self.inputs.strokes)?;
        let diagram_text = match &self.inputs.diagram {
            Some(path) => read_text(path)?,
            None => String::new(),
        };
        let element_positions: Option<Vec<ElementPosition>> = self
            .inputs
            .elements
            .as_deref()
            .map(read_json)
            .transpose()?;
        let image = self
            .inputs
            .image
            .as_deref()
            .map(read_data_url)
            .transpose()?;

        tracing::debug!(
            "Loaded {} strokes from {}",
            strokes.len(),
            self.inputs.strokes.display()
        );

        Ok(SketchInput {
            strokes,
            diagram_text,
            element_positions,
            image,
            hint: self.hint.clone(),
            canvas: self.canvas,
        })
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_data_url(path: &Path) -> Result<String, ConfigError> {
    let bytes = read_bytes(path)?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn args(strokes: PathBuf) -> CliArgs {
        CliArgs::parse_from([
            "sketch-agent",
            "--endpoint",
            "http://localhost:3000",
            "--strokes",
            strokes.to_str().expect("utf8 path"),
        ])
    }

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn defaults_follow_core_constants() {
        let config = AgentConfig::from(args(PathBuf::from("strokes.json")));
        assert_eq!(config.orchestrator.routing, RoutingConfig::default());
        assert_eq!(config.orchestrator.diagram_variant, "flowchart");
        assert_eq!(config.orchestrator.stage1_coverage, Stage1Coverage::AllStrokes);
        assert!(!config.orchestrator.decoder.strict);
        assert_eq!(config.canvas, CanvasSize::new(800.0, 600.0));
    }

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::parse_from([
            "sketch-agent",
            "--endpoint",
            "http://x",
            "--strokes",
            "s.json",
            "--max-strokes",
            "10",
            "--stage1-strokes",
            "4",
            "--strict-stream",
            "--variant",
            "sequence",
        ]);
        let config = AgentConfig::from(args);
        assert_eq!(config.orchestrator.routing.max_strokes, 10);
        assert_eq!(config.orchestrator.stage1_coverage, Stage1Coverage::Leading(4));
        assert!(config.orchestrator.decoder.strict);
        assert_eq!(config.orchestrator.diagram_variant, "sequence");
    }

    #[test]
    fn load_input_reads_every_file() {
        let dir = TempDir::new().expect("tempdir");
        let strokes = write_file(
            &dir,
            "strokes.json",
            br#"[{"id":"a","points":[0,0,10,10],"color":"red","width":3}]"#,
        );
        let diagram = write_file(&dir, "diagram.mmd", b"graph TD\n  A --> B\n");
        let elements = write_file(
            &dir,
            "elements.json",
            br#"[{"id":"A","label":"A","x":0,"y":0,"width":10,"height":10,"centerX":5,"centerY":5}]"#,
        );
        let image = write_file(&dir, "snap.png", &[0x89, b'P', b'N', b'G']);

        let mut config = AgentConfig::from(args(strokes));
        config.inputs.diagram = Some(diagram);
        config.inputs.elements = Some(elements);
        config.inputs.image = Some(image);
        config.hint = Some("tidy".into());

        let input = config.load_input().expect("load");
        assert_eq!(input.strokes.len(), 1);
        assert_eq!(input.strokes[0].color, "red");
        assert!(input.diagram_text.starts_with("graph TD"));
        assert_eq!(input.element_positions.as_ref().map(Vec::len), Some(1));
        assert_eq!(input.image.as_deref(), Some("data:image/png;base64,iVBORw=="));
        assert_eq!(input.hint.as_deref(), Some("tidy"));
    }

    #[test]
    fn invalid_stroke_file_reports_path() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(br#"[{"id":"a","points":[1,2,3]}]"#).expect("write");
        let config = AgentConfig::from(args(file.path().to_path_buf()));
        let err = config.load_input().expect_err("odd point count");
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_file_is_io_error() {
        let config = AgentConfig::from(args(PathBuf::from("/nonexistent/strokes.json")));
        assert!(matches!(config.load_input(), Err(ConfigError::Io { .. })));
    }
}
