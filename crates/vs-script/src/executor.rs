//! Script executor
//!
//! Drives [`ScriptRun`]s on the event bus. Every run gets its own task, its
//! own timers and its own cancellation token; runs share nothing but the bus.

use crate::runner::{RunStatus, RunnerConfig, ScriptRun, Suspension, Wakeup};
use crate::script::ScriptEntity;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use vs_core::events::{PlaybackEndedData, UtteranceData};
use vs_core::{Context, RunId};
use vs_event_bus::{SharedEventBus, TypedEventReceiver};

/// Starts script runs
#[derive(Clone)]
pub struct ScriptExecutor {
    bus: SharedEventBus,
    config: Arc<RunnerConfig>,
}

impl ScriptExecutor {
    pub fn new(bus: SharedEventBus, config: RunnerConfig) -> Self {
        Self {
            bus,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start a run of `script` with the given captured values
    ///
    /// Must be called from within a tokio runtime. The first utterance is
    /// fired from the spawned task, after the run is already listening for
    /// playback notifications.
    pub fn start(
        &self,
        script: &ScriptEntity,
        entities: HashMap<String, String>,
        context: Context,
    ) -> RunHandle {
        let id = RunId::new();
        let run = ScriptRun::new(
            id.clone(),
            script.name.clone(),
            Arc::clone(&script.actions),
            entities,
            &self.config,
        );

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        let playback = self.bus.subscribe_typed::<PlaybackEndedData>();

        let driver = RunDriver {
            bus: Arc::clone(&self.bus),
            config: Arc::clone(&self.config),
            playback,
            cancel: cancel.clone(),
            status: status_tx,
            context,
        };
        tokio::spawn(driver.drive(run));

        RunHandle {
            id,
            script: script.name.clone(),
            cancel,
            status: status_rx,
        }
    }
}

impl std::fmt::Debug for ScriptExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to an in-flight run
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    script: String,
    cancel: CancellationToken,
    status: watch::Receiver<RunStatus>,
}

impl RunHandle {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Request cancellation; takes effect at the run's next resumption point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Wait until the run completes or is cancelled
    pub async fn finished(&self) -> RunStatus {
        let mut status = self.status.clone();
        let terminal = status.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        terminal.unwrap_or_else(|_| *status.borrow())
    }
}

/// IO side of one run
struct RunDriver {
    bus: SharedEventBus,
    config: Arc<RunnerConfig>,
    playback: TypedEventReceiver<PlaybackEndedData>,
    cancel: CancellationToken,
    status: watch::Sender<RunStatus>,
    context: Context,
}

impl RunDriver {
    async fn drive(mut self, mut run: ScriptRun) {
        let mut rng = StdRng::from_entropy();
        let mut step = run.start(&mut rng);
        self.status.send_replace(run.status());

        loop {
            if let Some(text) = step.utterance.take() {
                if self.cancel.is_cancelled() {
                    break;
                }
                self.drain_playback();
                self.emit(run.id(), text);
            }

            let wakeup = match step.suspension {
                Suspension::Finished(_) => break,
                Suspension::Timer(duration) => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(duration) => Wakeup::TimerElapsed,
                    }
                }
                Suspension::PlaybackEnded => {
                    let timeout = self.config.playback_timeout;
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        wakeup = wait_for_playback(&mut self.playback, run.id(), timeout) => wakeup,
                    }
                }
            };

            match run.resume(wakeup, &mut rng) {
                Some(next) => step = next,
                None => {
                    warn!(run_id = %run.id(), ?wakeup, state = ?run.state(), "Run out of step with its driver");
                    break;
                }
            }
        }

        if !run.status().is_terminal() {
            run.cancel();
        }
        debug!(script = %run.script(), run_id = %run.id(), status = ?run.status(), "Run finished");
        self.status.send_replace(run.status());
    }

    fn emit(&self, run_id: &RunId, text: String) {
        debug!(run_id = %run_id, utterance = %text, "Emitting utterance");
        self.bus.fire_typed(
            UtteranceData {
                utterances: vec![text],
                lang: self.config.lang.clone(),
                run_id: Some(run_id.clone()),
            },
            self.context.child(),
        );
    }

    /// Discard playback notifications for earlier utterances
    fn drain_playback(&mut self) {
        loop {
            match self.playback.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}

/// Wait for a playback-ended event for `run_id`, or the watchdog
async fn wait_for_playback(
    playback: &mut TypedEventReceiver<PlaybackEndedData>,
    run_id: &RunId,
    timeout: Option<Duration>,
) -> Wakeup {
    let wait = async {
        loop {
            match playback.recv().await {
                Ok(event) if event.data.targets(run_id) => return,
                Ok(_) => trace!(run_id = %run_id, "Ignoring playback end of another run"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(run_id = %run_id, skipped, "Playback listener lagged")
                }
                Err(RecvError::Closed) => {
                    // bus is gone: only cancellation or the watchdog can end this
                    std::future::pending::<()>().await
                }
            }
        }
    };

    match timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, wait).await.is_err() {
                warn!(run_id = %run_id, ?limit, "No playback end received, continuing");
            }
        }
        None => wait.await,
    }

    Wakeup::PlaybackEnded
}
