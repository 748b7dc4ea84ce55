//! The scripting skill
//!
//! Owns the script registry and the executor, keeps the intent parser's view
//! of scripts in sync, and reacts to bus events: a matched trigger starts a
//! run, a wake word cancels every run in flight.

use crate::error::{SkillError, SkillResult};
use crate::registrar::BusTriggerRegistrar;
use crate::source::DeclarativeSource;
use crate::store::ScriptStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vs_config::SkillSettings;
use vs_core::events::{RegisterEntityData, TriggerMatchedData, TRIGGER_MATCHED, WAKEWORD};
use vs_core::{Context, Event, RunId};
use vs_event_bus::SharedEventBus;
use vs_script::{
    ReconcileReport, RunHandle, RunnerConfig, ScriptConfig, ScriptEntity, ScriptExecutor,
    ScriptOrigin, ScriptRegistry,
};

/// Vocabulary entity listing script names, for "describe/delete script X"
pub const SCRIPT_ENTITY: &str = "script";

/// A script as reported back to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDescription {
    pub name: String,
    pub triggers: Vec<String>,
    pub command: String,
    pub origin: ScriptOrigin,
}

impl From<&ScriptEntity> for ScriptDescription {
    fn from(script: &ScriptEntity) -> Self {
        Self {
            name: script.name.clone(),
            triggers: script.triggers.clone(),
            command: script.command.clone(),
            origin: script.origin,
        }
    }
}

/// Runner settings from the `scripting:` section
pub fn runner_config(settings: &SkillSettings) -> RunnerConfig {
    RunnerConfig {
        lang: settings.lang.clone(),
        grace_interval: settings.grace_interval(),
        placeholder_default: settings.placeholder_default.clone(),
        playback_timeout: settings.playback_timeout(),
    }
}

pub struct ScriptingSkill {
    bus: SharedEventBus,
    registry: ScriptRegistry,
    executor: ScriptExecutor,
    source: Box<dyn DeclarativeSource>,
    store: ScriptStore,
    /// In-flight runs
    runs: Mutex<HashMap<RunId, RunHandle>>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScriptingSkill {
    pub fn new(
        bus: SharedEventBus,
        settings: &SkillSettings,
        source: Box<dyn DeclarativeSource>,
        store: ScriptStore,
    ) -> Self {
        let registrar = Arc::new(BusTriggerRegistrar::new(Arc::clone(&bus)));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry: ScriptRegistry::new(registrar),
            executor: ScriptExecutor::new(Arc::clone(&bus), runner_config(settings)),
            bus,
            source,
            store,
            runs: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, RunHandle>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restore stored interactive scripts, then load the declarative ones
    ///
    /// A broken configuration document is logged and leaves only the
    /// interactive scripts loaded.
    pub async fn initialize(&self) -> SkillResult<()> {
        let stored = self.store.load().await?;
        let restored = self.registry.restore_interactive(&stored);
        if !restored.skipped.is_empty() {
            warn!(skipped = ?restored.skipped, "Some stored scripts were not restored");
        }

        if let Err(e) = self.reload() {
            warn!(error = %e, "Declarative scripts not loaded");
        }
        self.refresh_vocabulary();

        info!(scripts = self.registry.len(), "Scripting skill initialized");
        Ok(())
    }

    /// Re-read the declarative document and reconcile
    ///
    /// On a load error the registry keeps its current contents.
    pub fn reload(&self) -> SkillResult<ReconcileReport> {
        let report = self.registry.reload(self.source.load())?;
        if report.has_changes() {
            self.refresh_vocabulary();
        }
        Ok(report)
    }

    /// Create and persist an interactive script
    ///
    /// If saving fails the script is removed again.
    pub async fn create_script(
        &self,
        name: &str,
        triggers: Vec<String>,
        command: &str,
    ) -> SkillResult<Arc<ScriptEntity>> {
        let config = ScriptConfig::new(triggers, command);
        let script = ScriptEntity::new(name, &config, ScriptOrigin::Interactive)?;
        let script = self.registry.add(script)?;

        if let Err(e) = self.persist().await {
            warn!(script = %script.name, error = %e, "Could not save new script, dropping it");
            let _ = self.registry.remove_interactive(&script.name);
            return Err(e);
        }

        info!(script = %script.name, "Created script");
        self.refresh_vocabulary();
        Ok(script)
    }

    /// Delete and forget an interactive script
    ///
    /// If saving fails the script is put back.
    pub async fn delete_script(&self, name: &str) -> SkillResult<()> {
        let removed = self.registry.remove_interactive(name)?;

        if let Err(e) = self.persist().await {
            warn!(script = %removed.name, error = %e, "Could not save deletion, restoring script");
            let _ = self.registry.add(ScriptEntity::clone(&removed));
            return Err(e);
        }

        info!(script = %removed.name, "Deleted script");
        self.refresh_vocabulary();
        Ok(())
    }

    /// Script names in registry order
    pub fn list_scripts(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn describe_script(&self, name: &str) -> Option<ScriptDescription> {
        self.registry
            .get(name)
            .map(|script| ScriptDescription::from(script.as_ref()))
    }

    /// Start a run of the named script
    pub fn trigger(
        &self,
        name: &str,
        entities: HashMap<String, String>,
        context: Context,
    ) -> SkillResult<RunHandle> {
        let script = self
            .registry
            .get(name)
            .ok_or_else(|| SkillError::UnknownScript {
                name: name.to_string(),
            })?;

        let handle = self.executor.start(&script, entities, context);
        debug!(script = %name, run_id = %handle.id(), "Triggered script");

        let mut runs = self.runs();
        runs.retain(|_, run| !run.is_finished());
        runs.insert(handle.id().clone(), handle.clone());
        Ok(handle)
    }

    /// Cancel every run in flight, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let runs: Vec<RunHandle> = self.runs().drain().map(|(_, run)| run).collect();
        let mut cancelled = 0;
        for run in runs {
            if !run.is_finished() {
                run.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(cancelled, "Cancelled running scripts");
        }
        cancelled
    }

    /// Number of runs not yet finished
    pub fn active_runs(&self) -> usize {
        self.runs().values().filter(|run| !run.is_finished()).count()
    }

    /// Tell the intent parser which script names exist
    pub fn refresh_vocabulary(&self) {
        self.bus.fire_typed(
            RegisterEntityData {
                name: SCRIPT_ENTITY.to_string(),
                samples: self.registry.names(),
            },
            Context::new(),
        );
    }

    async fn persist(&self) -> SkillResult<()> {
        self.store.save(self.registry.interactive()).await?;
        Ok(())
    }

    /// Start listening on the bus
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scripting skill already running");
            return;
        }

        info!("Starting scripting skill");
        let mut event_rx = self.bus.subscribe_all();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let skill = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event_result = event_rx.recv() => {
                        match event_result {
                            Ok(event) => skill.process_event(&event),
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Scripting skill lagged by {} events", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Event bus closed, stopping scripting skill");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                }
            }

            skill.running.store(false, Ordering::SeqCst);
            info!("Scripting skill stopped");
        });
    }

    /// Stop listening on the bus
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        info!("Stopping scripting skill");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop, cancel runs and persist interactive scripts
    pub async fn shutdown(&self) -> SkillResult<()> {
        self.stop();
        self.cancel_all();
        self.persist().await
    }

    fn process_event(&self, event: &Event) {
        match event.event_type.as_str() {
            WAKEWORD => {
                self.cancel_all();
            }
            TRIGGER_MATCHED => {
                let data: TriggerMatchedData = match serde_json::from_value(event.data.clone()) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "Malformed trigger message");
                        return;
                    }
                };
                if let Err(e) = self.trigger(&data.script, data.entities, event.context.child()) {
                    warn!(error = %e, "Cannot run matched script");
                }
            }
            _ => {}
        }
    }
}
