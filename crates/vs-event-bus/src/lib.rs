//! Message bus for the scripting skill
//!
//! The bus stands in for the voice assistant's message bus inside this
//! process. Runs fire utterance requests on it and wait on it for playback
//! notifications; the skill listens on it for trigger matches and wake words.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, trace, warn};
use vs_core::{Context, Event, EventData, EventType};

/// Events a lagging subscriber may fall behind by before it misses some
const BACKLOG: usize = 1024;

/// Broadcast bus keyed by message type
///
/// Every subscriber gets every event of the type it subscribed to, in the
/// order they were fired. Subscribers of all events (`subscribe_all`) see the
/// whole stream.
pub struct EventBus {
    channels: DashMap<EventType, broadcast::Sender<Event>>,
    firehose: broadcast::Sender<Event>,
    backlog: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(BACKLOG)
    }

    /// Create a bus whose per-type channels hold `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            firehose,
            backlog: capacity,
        }
    }

    /// Subscribe to events of one type
    ///
    /// Only events fired after this call are received.
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        let event_type = event_type.into();
        trace!(%event_type, "New subscriber");

        self.channels
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.backlog).0)
            .subscribe()
    }

    /// Subscribe to a typed payload
    pub fn subscribe_typed<T: EventData + DeserializeOwned>(&self) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Subscribe to every event fired on the bus
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.firehose.subscribe()
    }

    /// Fire an event to its type's subscribers and to all-event subscribers
    pub fn fire(&self, event: Event) {
        debug!(event_type = %event.event_type, context = %event.context.id, "Fire");

        if let Some(sender) = self.channels.get(&event.event_type) {
            // A send error only means nobody is listening
            let _ = sender.send(event.clone());
        }

        let _ = self.firehose.send(event);
    }

    /// Fire a typed payload
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        match serde_json::to_value(&data) {
            Ok(data) => self.fire(Event::new(T::event_type(), data, context)),
            Err(e) => warn!(event_type = T::event_type(), error = %e, "Dropping unserializable event"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that decodes payloads, skipping events that do not decode
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event>,
    payload: PhantomData<T>,
}

impl<T: EventData + DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event>) -> Self {
        Self {
            rx,
            payload: PhantomData,
        }
    }

    /// Wait for the next decodable event
    pub async fn recv(&mut self) -> Result<Event<T>, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(typed) = event.decode() {
                return Ok(typed);
            }
        }
    }

    /// Take the next decodable event if one is already queued
    pub fn try_recv(&mut self) -> Result<Event<T>, TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if let Some(typed) = event.decode() {
                return Ok(typed);
            }
        }
    }
}

/// Shared handle to the bus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vs_core::events::{PlaybackEndedData, UtteranceData, AUDIO_OUTPUT_END, WAKEWORD};
    use vs_core::RunId;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(WAKEWORD);

        bus.fire(Event::new(WAKEWORD, json!({"utterance": "hey"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), WAKEWORD);
        assert_eq!(received.data["utterance"], "hey");
    }

    #[tokio::test]
    async fn test_match_all_sees_every_type_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();

        bus.fire(Event::new(WAKEWORD, json!({}), Context::new()));
        bus.fire(Event::new(AUDIO_OUTPUT_END, json!({}), Context::new()));

        assert_eq!(rx.recv().await.unwrap().event_type.as_str(), WAKEWORD);
        assert_eq!(rx.recv().await.unwrap().event_type.as_str(), AUDIO_OUTPUT_END);
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<UtteranceData>();

        let run_id = RunId::new();
        bus.fire_typed(
            UtteranceData {
                utterances: vec!["Hi there".into()],
                lang: "en-us".into(),
                run_id: Some(run_id.clone()),
            },
            Context::new(),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.utterances, vec!["Hi there".to_string()]);
        assert_eq!(received.data.run_id, Some(run_id));
    }

    #[tokio::test]
    async fn test_typed_receiver_skips_undecodable_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<UtteranceData>();

        bus.fire(Event::new(
            vs_core::events::UTTERANCE,
            json!({"garbage": true}),
            Context::new(),
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_cross_type_delivery() {
        let bus = EventBus::new();
        let mut wake_rx = bus.subscribe(WAKEWORD);
        let mut playback_rx = bus.subscribe_typed::<PlaybackEndedData>();

        bus.fire_typed(PlaybackEndedData::default(), Context::new());

        assert!(wake_rx.try_recv().is_err());
        assert!(playback_rx.try_recv().is_ok());
    }
}
