//! Bus messages

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Context;

/// A payload with a fixed message type
pub trait EventData: Clone + Send + Sync + 'static {
    fn event_type() -> &'static str;
}

/// Message type, e.g. `recognizer_loop:utterance`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(event_type: &str) -> Self {
        Self(event_type.to_owned())
    }
}

impl From<String> for EventType {
    fn from(event_type: String) -> Self {
        Self(event_type)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message on the bus
///
/// Untyped events carry their payload as JSON; [`Event::decode`] turns them
/// into typed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: T,
    pub time_fired: DateTime<Utc>,
    pub context: Context,
}

impl<T> Event<T> {
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
            context,
        }
    }
}

impl Event {
    /// Typed view of the payload, `None` if it does not decode as `T`
    pub fn decode<T: DeserializeOwned>(self) -> Option<Event<T>> {
        let data = serde_json::from_value(self.data).ok()?;
        Some(Event {
            event_type: self.event_type,
            data,
            time_fired: self.time_fired,
            context: self.context,
        })
    }
}
