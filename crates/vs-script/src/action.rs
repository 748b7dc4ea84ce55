//! Action types
//!
//! An action is one step of a script: something to say, a random pick of
//! something to say, or a pause.

use std::time::Duration;

/// What a step does
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Speak a template
    Literal(String),

    /// Speak one template picked uniformly at random; never empty
    RandomChoice(Vec<String>),

    /// Pause
    Delay(Duration),
}

/// One executable step
///
/// Fields are private so a `RandomChoice` can never be built empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    kind: ActionKind,
    wait_for_reply: bool,
}

impl Action {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Literal(text.into()),
            wait_for_reply: false,
        }
    }

    /// `None` if `items` is empty
    pub fn choice(items: Vec<String>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            kind: ActionKind::RandomChoice(items),
            wait_for_reply: false,
        })
    }

    pub fn delay(duration: Duration) -> Self {
        Self {
            kind: ActionKind::Delay(duration),
            wait_for_reply: false,
        }
    }

    pub(crate) fn with_wait(mut self, wait_for_reply: bool) -> Self {
        self.wait_for_reply = wait_for_reply;
        self
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Whether the next step waits for playback end
    ///
    /// Meaningless for `Delay`, which resumes after its own duration.
    pub fn wait_for_reply(&self) -> bool {
        self.wait_for_reply
    }
}
