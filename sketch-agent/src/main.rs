//! # Saorsa Sketch Agent
//!
//! Reads a stroke batch from disk, runs it through the staged generation
//! pipeline and prints the result as JSON on stdout. Logs go to stderr.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sketch_agent::{
    AgentConfig, CliArgs, ClientDescriptor, HttpGenerationClient, Outcome, SketchSession,
    StageHooks, StageOrchestrator,
};

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,sketch_agent=debug,sketch_core=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sketch_agent=debug,sketch_core=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AgentConfig::from(CliArgs::parse());
    let input = config.load_input()?;
    tracing::info!(
        "Loaded {} strokes, {} element positions",
        input.strokes.len(),
        input.element_positions.as_ref().map_or(0, Vec::len)
    );

    let client = HttpGenerationClient::new(&config.endpoint, ClientDescriptor::default())?;
    tracing::info!("Generation endpoint: {}", client.endpoint());

    let orchestrator = StageOrchestrator::with_config(client, config.orchestrator.clone());
    let session = Arc::new(SketchSession::new(orchestrator));

    // Ctrl-C cancels the run instead of killing the process
    {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling");
                session.cancel();
            }
        });
    }

    let hooks = StageHooks::new().on_intermediate(|partial| {
        tracing::info!(
            "Stage 1 result ready (diagram: {}, rationale: {})",
            partial.diagram_text.is_some(),
            partial.rationale.is_some()
        );
    });

    match session.submit(&input, &hooks).await {
        Ok(Outcome::Completed(result)) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(Outcome::Cancelled) => {
            tracing::info!("Cancelled, no result");
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.report())?);
            Err(anyhow::anyhow!("Generation failed: {}", e))
        }
    }
}
