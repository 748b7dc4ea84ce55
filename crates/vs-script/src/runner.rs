//! Run state machine
//!
//! [`ScriptRun`] walks a script's actions one at a time without doing any IO
//! itself. Each transition returns a [`Step`]: at most one utterance to speak
//! and what to wait for before resuming. The executor performs the IO and
//! feeds the resulting [`Wakeup`] back in.

use crate::action::{Action, ActionKind};
use crate::template;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use vs_core::RunId;

/// Runner settings shared by every run
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Language tag put on utterances
    pub lang: String,

    /// Pause after an utterance that does not wait for playback
    pub grace_interval: Duration,

    /// Text for placeholders with no captured value
    pub placeholder_default: String,

    /// Give up waiting for playback after this long; `None` waits forever
    pub playback_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            lang: "en-us".to_string(),
            grace_interval: Duration::from_millis(500),
            placeholder_default: String::new(),
            playback_timeout: None,
        }
    }
}

/// Externally visible run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

/// Where the run is between transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,

    /// Spoke action `index`, waiting for playback to end
    AwaitingPlayback { index: usize },

    /// Spoke action `index`, waiting out the grace interval
    Pacing { index: usize },

    /// Inside the delay of action `index`
    Sleeping { index: usize },

    Completed,
    Cancelled,
}

/// What a suspended run waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    Timer(Duration),
    PlaybackEnded,
    Finished(RunStatus),
}

/// Output of one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Rendered text to speak now
    pub utterance: Option<String>,
    pub suspension: Suspension,
}

/// Input that resumes a suspended run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    TimerElapsed,
    PlaybackEnded,
}

/// One execution of a script
#[derive(Debug)]
pub struct ScriptRun {
    id: RunId,
    script: String,
    actions: Arc<[Action]>,
    entities: HashMap<String, String>,
    grace_interval: Duration,
    placeholder_default: String,
    state: RunState,
}

impl ScriptRun {
    pub fn new(
        id: RunId,
        script: impl Into<String>,
        actions: Arc<[Action]>,
        entities: HashMap<String, String>,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            id,
            script: script.into(),
            actions,
            entities,
            grace_interval: config.grace_interval,
            placeholder_default: config.placeholder_default.clone(),
            state: RunState::Idle,
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn status(&self) -> RunStatus {
        match self.state {
            RunState::Idle => RunStatus::Idle,
            RunState::Completed => RunStatus::Completed,
            RunState::Cancelled => RunStatus::Cancelled,
            RunState::AwaitingPlayback { .. }
            | RunState::Pacing { .. }
            | RunState::Sleeping { .. } => RunStatus::Running,
        }
    }

    /// Dispatch the first action
    ///
    /// On a run that has already started this only reports the current
    /// suspension.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Step {
        if self.state != RunState::Idle {
            return Step {
                utterance: None,
                suspension: self.suspension(),
            };
        }
        debug!(script = %self.script, run_id = %self.id, "Starting run");
        self.dispatch(0, rng)
    }

    /// Continue after a suspension ends
    ///
    /// Returns `None` when `wakeup` is not what the run is waiting for.
    pub fn resume<R: Rng + ?Sized>(&mut self, wakeup: Wakeup, rng: &mut R) -> Option<Step> {
        let index = match (self.state, wakeup) {
            (RunState::AwaitingPlayback { index }, Wakeup::PlaybackEnded) => index,
            (RunState::Pacing { index }, Wakeup::TimerElapsed) => index,
            (RunState::Sleeping { index }, Wakeup::TimerElapsed) => index,
            (state, wakeup) => {
                trace!(run_id = %self.id, ?state, ?wakeup, "Ignoring wakeup");
                return None;
            }
        };
        Some(self.dispatch(index + 1, rng))
    }

    /// Stop the run; `false` if it had already finished
    pub fn cancel(&mut self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        debug!(script = %self.script, run_id = %self.id, state = ?self.state, "Cancelling run");
        self.state = RunState::Cancelled;
        true
    }

    fn suspension(&self) -> Suspension {
        match self.state {
            RunState::AwaitingPlayback { .. } => Suspension::PlaybackEnded,
            RunState::Pacing { .. } => Suspension::Timer(self.grace_interval),
            RunState::Sleeping { index } => match self.actions.get(index).map(Action::kind) {
                Some(ActionKind::Delay(duration)) => Suspension::Timer(*duration),
                _ => Suspension::Timer(Duration::ZERO),
            },
            RunState::Idle | RunState::Completed | RunState::Cancelled => {
                Suspension::Finished(self.status())
            }
        }
    }

    fn dispatch<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Step {
        let Some(action) = self.actions.get(index) else {
            debug!(script = %self.script, run_id = %self.id, "Run completed");
            self.state = RunState::Completed;
            return Step {
                utterance: None,
                suspension: Suspension::Finished(RunStatus::Completed),
            };
        };

        let text = match action.kind() {
            ActionKind::Delay(duration) => {
                trace!(run_id = %self.id, index, ?duration, "Sleeping");
                self.state = RunState::Sleeping { index };
                return Step {
                    utterance: None,
                    suspension: Suspension::Timer(*duration),
                };
            }
            ActionKind::Literal(text) => text.as_str(),
            ActionKind::RandomChoice(items) => items.choose(rng).map(String::as_str).unwrap_or(""),
        };

        let utterance = template::render(text, &self.entities, &self.placeholder_default);
        trace!(run_id = %self.id, index, %utterance, "Speaking");

        let suspension = if action.wait_for_reply() {
            self.state = RunState::AwaitingPlayback { index };
            Suspension::PlaybackEnded
        } else {
            self.state = RunState::Pacing { index };
            Suspension::Timer(self.grace_interval)
        };

        Step {
            utterance: Some(utterance),
            suspension,
        }
    }
}
