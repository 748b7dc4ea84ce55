//! Persistence of interactively created scripts

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vs_script::ScriptConfig;
use vs_storage::{Storable, Storage, StorageResult};

/// Stored interactive scripts, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveScripts {
    #[serde(default)]
    pub scripts: IndexMap<String, ScriptConfig>,
}

impl Storable for InteractiveScripts {
    const KEY: &'static str = "scripting.interactive_scripts";
    const VERSION: u32 = 1;
    const MINOR_VERSION: u32 = 1;
}

/// Reads and writes [`InteractiveScripts`]
#[derive(Debug, Clone)]
pub struct ScriptStore {
    storage: Storage,
}

impl ScriptStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Stored scripts, empty if nothing was saved yet
    pub async fn load(&self) -> StorageResult<IndexMap<String, ScriptConfig>> {
        let stored = self.storage.load_data::<InteractiveScripts>().await?;
        Ok(stored.map(|s| s.scripts).unwrap_or_default())
    }

    pub async fn save(&self, scripts: IndexMap<String, ScriptConfig>) -> StorageResult<()> {
        let count = scripts.len();
        self.storage
            .save_data(&InteractiveScripts { scripts })
            .await?;
        debug!(count, "Saved interactive scripts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_keeps_order() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::new(Storage::new(dir.path()));
        assert!(store.load().await.unwrap().is_empty());

        let mut scripts = IndexMap::new();
        scripts.insert(
            "note".to_string(),
            ScriptConfig::new(vec!["take a note".into()], "Ready&!sleep(1)"),
        );
        scripts.insert(
            "alarm".to_string(),
            ScriptConfig::new(vec!["wake me".into()], "set an alarm for {time}"),
        );
        store.save(scripts.clone()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, scripts);
        assert!(dir
            .path()
            .join(".storage")
            .join(InteractiveScripts::KEY)
            .exists());
    }
}
