//! Trigger registration over the bus

use vs_core::events::{DetachIntentData, RegisterIntentData};
use vs_core::Context;
use vs_event_bus::SharedEventBus;
use vs_script::TriggerRegistrar;
use tracing::debug;

/// Registers trigger phrases with the intent parser by bus message
///
/// The intent for script `name` is called `name.intent`.
pub struct BusTriggerRegistrar {
    bus: SharedEventBus,
}

impl BusTriggerRegistrar {
    pub fn new(bus: SharedEventBus) -> Self {
        Self { bus }
    }

    pub fn intent_name(script: &str) -> String {
        format!("{script}.intent")
    }
}

impl TriggerRegistrar for BusTriggerRegistrar {
    fn register_trigger(&self, name: &str, phrases: &[String]) {
        let intent_name = Self::intent_name(name);
        debug!(intent = %intent_name, phrases = phrases.len(), "Registering intent");
        self.bus.fire_typed(
            RegisterIntentData {
                name: intent_name,
                samples: phrases.to_vec(),
            },
            Context::new(),
        );
    }

    fn unregister_trigger(&self, name: &str) {
        let intent_name = Self::intent_name(name);
        debug!(intent = %intent_name, "Detaching intent");
        self.bus
            .fire_typed(DetachIntentData { intent_name }, Context::new());
    }
}
