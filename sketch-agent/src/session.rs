//! Caller-facing session that allows one orchestration at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::GenerationClient;
use crate::error::OrchestrationError;
use crate::orchestrator::{Outcome, ProcessingState, StageHooks, StageOrchestrator};
use crate::request::SketchInput;

/// Wraps a [`StageOrchestrator`] so that starting a new run cancels the
/// previous one.
pub struct SketchSession<C> {
    orchestrator: StageOrchestrator<C>,
    active: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
    run_lock: tokio::sync::Mutex<()>,
}

impl<C: GenerationClient> SketchSession<C> {
    /// Create a session around an orchestrator.
    #[must_use]
    pub fn new(orchestrator: StageOrchestrator<C>) -> Self {
        Self {
            orchestrator,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The wrapped orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &StageOrchestrator<C> {
        &self.orchestrator
    }

    /// Start a run, cancelling any run still in flight.
    ///
    /// The previous run is allowed to unwind before this one starts, so the
    /// state channel never interleaves two runs.
    ///
    /// # Errors
    ///
    /// See [`StageOrchestrator::run`].
    pub async fn submit(
        &self,
        input: &SketchInput,
        hooks: &StageHooks,
    ) -> Result<Outcome, OrchestrationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((prev, prev_token)) = self.lock_active().replace((id, token.clone())) {
            debug!("Run {} supersedes run {}", id, prev);
            prev_token.cancel();
        }

        let _running = self.run_lock.lock().await;
        let outcome = self.orchestrator.run(input, &token, hooks).await;

        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|(current, _)| *current == id) {
            *active = None;
        }
        outcome
    }

    /// Cancel the run in flight. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.lock_active().take() {
            Some((id, token)) => {
                debug!("Cancelling run {}", id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a run has been submitted and not yet finished.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProcessingState {
        self.orchestrator.state()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.orchestrator.subscribe()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.active.lock().unwrap_or_else(|e| {
            error!("Active run lock poisoned ({}), recovering", e);
            e.into_inner()
        })
    }
}
