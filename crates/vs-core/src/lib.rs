//! Core types for voice scripts
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: Event, Context, RunId and the typed payloads of the bus
//! messages the scripting skill sends and listens for.

mod context;
mod event;
mod run_id;

pub use context::Context;
pub use event::{Event, EventData, EventType};
pub use run_id::RunId;

/// Bus messages exchanged with the voice assistant
pub mod events {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    /// Request to speak / process an utterance
    pub const UTTERANCE: &str = "recognizer_loop:utterance";

    /// Speech playback finished
    pub const AUDIO_OUTPUT_END: &str = "recognizer_loop:audio_output_end";

    /// Wake word detected
    pub const WAKEWORD: &str = "recognizer_loop:wakeword";

    /// The front-end matched a script trigger
    pub const TRIGGER_MATCHED: &str = "scripting:trigger_matched";

    /// Register trigger phrases with the intent parser
    pub const REGISTER_INTENT: &str = "padatious:register_intent";

    /// Register a vocabulary entity with the intent parser
    pub const REGISTER_ENTITY: &str = "padatious:register_entity";

    /// Remove a previously registered intent
    pub const DETACH_INTENT: &str = "detach_intent";

    /// Data for UTTERANCE events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct UtteranceData {
        pub utterances: Vec<String>,
        pub lang: String,
        /// Run that emitted the utterance, echoed back on playback end
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub run_id: Option<RunId>,
    }

    impl EventData for UtteranceData {
        fn event_type() -> &'static str {
            UTTERANCE
        }
    }

    /// Data for AUDIO_OUTPUT_END events
    ///
    /// Without a `run_id` the event applies to every run waiting on playback.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct PlaybackEndedData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub run_id: Option<RunId>,
    }

    impl PlaybackEndedData {
        /// Whether this notification concerns the given run
        pub fn targets(&self, run_id: &RunId) -> bool {
            self.run_id.as_ref().map_or(true, |id| id == run_id)
        }
    }

    impl EventData for PlaybackEndedData {
        fn event_type() -> &'static str {
            AUDIO_OUTPUT_END
        }
    }

    /// Data for WAKEWORD events
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct WakewordData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub utterance: Option<String>,
    }

    impl EventData for WakewordData {
        fn event_type() -> &'static str {
            WAKEWORD
        }
    }

    /// Data for TRIGGER_MATCHED events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TriggerMatchedData {
        pub script: String,
        /// Placeholder values captured from the matched phrase
        #[serde(default)]
        pub entities: HashMap<String, String>,
    }

    impl EventData for TriggerMatchedData {
        fn event_type() -> &'static str {
            TRIGGER_MATCHED
        }
    }

    /// Data for REGISTER_INTENT events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RegisterIntentData {
        pub name: String,
        pub samples: Vec<String>,
    }

    impl EventData for RegisterIntentData {
        fn event_type() -> &'static str {
            REGISTER_INTENT
        }
    }

    /// Data for REGISTER_ENTITY events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RegisterEntityData {
        pub name: String,
        pub samples: Vec<String>,
    }

    impl EventData for RegisterEntityData {
        fn event_type() -> &'static str {
            REGISTER_ENTITY
        }
    }

    /// Data for DETACH_INTENT events
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DetachIntentData {
        pub intent_name: String,
    }

    impl EventData for DetachIntentData {
        fn event_type() -> &'static str {
            DETACH_INTENT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::events::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_playback_ended_without_run_id_targets_everyone() {
        let data: PlaybackEndedData = serde_json::from_value(json!({})).unwrap();
        assert!(data.targets(&RunId::new()));
    }

    #[test]
    fn test_playback_ended_targets_only_its_run() {
        let mine = RunId::new();
        let other = RunId::new();
        let data = PlaybackEndedData {
            run_id: Some(mine.clone()),
        };
        assert!(data.targets(&mine));
        assert!(!data.targets(&other));
    }

    #[test]
    fn test_utterance_wire_shape() {
        let data = UtteranceData {
            utterances: vec!["Hi there".to_string()],
            lang: "en-us".to_string(),
            run_id: None,
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value, json!({"utterances": ["Hi there"], "lang": "en-us"}));
    }

    #[test]
    fn test_trigger_matched_entities_default_empty() {
        let data: TriggerMatchedData =
            serde_json::from_value(json!({"script": "greet"})).unwrap();
        assert_eq!(data.script, "greet");
        assert!(data.entities.is_empty());
    }
}
