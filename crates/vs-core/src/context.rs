use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Causality link carried by every event
///
/// A run started from a trigger match fires its utterances with children of
/// the match's context, so each one can be traced back to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: Ulid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Ulid>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new(),
            parent: None,
        }
    }

    /// A fresh context caused by this one
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new(),
            parent: Some(self.id),
        }
    }

    pub fn is_child_of(&self, other: &Context) -> bool {
        self.parent == Some(other.id)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
