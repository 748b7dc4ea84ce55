//! Script registry
//!
//! One process-wide collection of scripts behind a reader-writer lock.
//! Declarative scripts are replaced wholesale by [`ScriptRegistry::reconcile`];
//! interactive scripts are only added and removed one at a time.

use crate::script::{DeclarativeScripts, ScriptConfig, ScriptEntity, ScriptError, ScriptOrigin};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A script named {name} already exists")]
    NameCollision { name: String },

    #[error("Script {name} is defined more than once")]
    DuplicateName { name: String },

    #[error("No script named {name}")]
    NotFound { name: String },

    #[error("Script {name} comes from the configuration and cannot be deleted")]
    DeclarativeProtected { name: String },

    #[error("Failed to load scripts: {0}")]
    ParseFailure(String),

    #[error(transparent)]
    InvalidScript(#[from] ScriptError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Makes trigger phrases recognisable, or forgets them
///
/// Called with the registry's write lock held, so implementations must not
/// call back into the registry.
pub trait TriggerRegistrar: Send + Sync {
    fn register_trigger(&self, name: &str, phrases: &[String]);

    fn unregister_trigger(&self, name: &str);
}

/// What a reconcile changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,

    /// Not added because an interactive script already has the name
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    /// No script was added, removed or updated
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        !self.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} updated, {} skipped",
            self.added.len(),
            self.removed.len(),
            self.updated.len(),
            self.skipped.len()
        )
    }
}

/// The live set of scripts
pub struct ScriptRegistry {
    scripts: RwLock<IndexMap<String, Arc<ScriptEntity>>>,
    registrar: Arc<dyn TriggerRegistrar>,
}

impl ScriptRegistry {
    pub fn new(registrar: Arc<dyn TriggerRegistrar>) -> Self {
        Self {
            scripts: RwLock::new(IndexMap::new()),
            registrar,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Arc<ScriptEntity>>> {
        self.scripts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Arc<ScriptEntity>>> {
        self.scripts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a script, failing if the name is taken by any script
    pub fn add(&self, script: ScriptEntity) -> RegistryResult<Arc<ScriptEntity>> {
        let mut scripts = self.write();
        if scripts.contains_key(&script.name) {
            return Err(RegistryError::NameCollision { name: script.name });
        }

        let script = Arc::new(script);
        self.registrar
            .register_trigger(&script.name, &script.triggers);
        scripts.insert(script.name.clone(), Arc::clone(&script));
        debug!(script = %script.name, origin = ?script.origin, "Added script");
        Ok(script)
    }

    /// Delete an interactive script
    pub fn remove_interactive(&self, name: &str) -> RegistryResult<Arc<ScriptEntity>> {
        let name = name.trim();
        let mut scripts = self.write();
        match scripts.get(name) {
            None => {
                return Err(RegistryError::NotFound {
                    name: name.to_string(),
                })
            }
            Some(script) if script.origin == ScriptOrigin::Declarative => {
                return Err(RegistryError::DeclarativeProtected {
                    name: name.to_string(),
                })
            }
            Some(_) => {}
        }

        self.registrar.unregister_trigger(name);
        let removed = scripts
            .shift_remove(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        debug!(script = %name, "Removed interactive script");
        Ok(removed)
    }

    /// Names are trimmed the same way [`ScriptEntity::new`] trims them
    pub fn get(&self, name: &str) -> Option<Arc<ScriptEntity>> {
        self.read().get(name.trim()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name.trim())
    }

    /// Script names in registry order
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Every script, as seen at one instant
    pub fn snapshot(&self) -> Vec<Arc<ScriptEntity>> {
        self.read().values().cloned().collect()
    }

    /// Interactive scripts, for persistence
    pub fn interactive(&self) -> IndexMap<String, ScriptConfig> {
        self.read()
            .values()
            .filter(|script| script.is_interactive())
            .map(|script| (script.name.clone(), script.config()))
            .collect()
    }

    /// Add persisted interactive scripts at startup
    ///
    /// Entries that collide or no longer validate are skipped and reported.
    pub fn restore_interactive(&self, entries: &IndexMap<String, ScriptConfig>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (name, config) in entries {
            let script = match ScriptEntity::new(name, config, ScriptOrigin::Interactive) {
                Ok(script) => script,
                Err(e) => {
                    warn!(script = %name, error = %e, "Dropping invalid stored script");
                    report.skipped.push(name.clone());
                    continue;
                }
            };

            match self.add(script) {
                Ok(script) => report.added.push(script.name.clone()),
                Err(e) => {
                    warn!(script = %name, error = %e, "Skipping stored script");
                    report.skipped.push(name.clone());
                }
            }
        }

        info!(restored = report.added.len(), skipped = report.skipped.len(), "Restored interactive scripts");
        report
    }

    /// Replace the declarative subset with `scripts`
    ///
    /// Every definition is validated before anything changes, so an invalid
    /// document leaves the registry untouched. Interactive scripts are kept;
    /// declarative entries that collide with one are skipped.
    pub fn reconcile(&self, scripts: &DeclarativeScripts) -> RegistryResult<ReconcileReport> {
        let mut incoming: IndexMap<String, (&ScriptConfig, ScriptEntity)> = IndexMap::new();
        for (name, config) in scripts {
            let script = ScriptEntity::new(name, config, ScriptOrigin::Declarative)?;
            if incoming.contains_key(&script.name) {
                return Err(RegistryError::DuplicateName { name: script.name });
            }
            incoming.insert(script.name.clone(), (config, script));
        }

        let mut current = self.write();
        let mut report = ReconcileReport::default();

        for (name, script) in current.iter() {
            if script.origin != ScriptOrigin::Declarative {
                continue;
            }
            match incoming.get(name) {
                None => report.removed.push(name.clone()),
                Some((config, _)) if !script.same_definition(config) => {
                    report.updated.push(name.clone())
                }
                Some(_) => {}
            }
        }

        for name in report.removed.iter().chain(&report.updated) {
            self.registrar.unregister_trigger(name);
            current.shift_remove(name);
        }

        let updated: HashSet<&str> = report.updated.iter().map(String::as_str).collect();
        let mut added = Vec::new();
        let mut skipped = Vec::new();

        for (name, (_, script)) in incoming {
            let is_update = updated.contains(name.as_str());
            if !is_update {
                match current.get(&name) {
                    Some(existing) if existing.origin == ScriptOrigin::Declarative => continue,
                    Some(_) => {
                        warn!(script = %name, "Interactive script has the same name, skipping");
                        skipped.push(name);
                        continue;
                    }
                    None => {}
                }
            }

            self.registrar.register_trigger(&name, &script.triggers);
            current.insert(name.clone(), Arc::new(script));
            if !is_update {
                added.push(name);
            }
        }

        report.added = added;
        report.skipped = skipped;

        if report.has_changes() {
            info!(%report, "Reconciled declarative scripts");
        } else {
            debug!("Declarative scripts unchanged");
        }
        Ok(report)
    }

    /// Reconcile from a freshly loaded document
    ///
    /// A load error leaves the registry unchanged.
    pub fn reload<E: fmt::Display>(
        &self,
        loaded: Result<DeclarativeScripts, E>,
    ) -> RegistryResult<ReconcileReport> {
        match loaded {
            Ok(scripts) => self.reconcile(&scripts),
            Err(e) => {
                warn!(error = %e, "Failed to load declarative scripts, keeping current set");
                Err(RegistryError::ParseFailure(e.to_string()))
            }
        }
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.names())
            .finish_non_exhaustive()
    }
}
