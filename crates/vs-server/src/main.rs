//! Voice scripts daemon
//!
//! Reads `configuration.yaml` from `$VS_CONFIG_DIR` (default: the current
//! directory), runs the scripting skill on the message bus until Ctrl-C, and
//! reloads the declarative scripts on SIGHUP.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vs_config::{load_yaml, section, SkillSettings, CONFIG_FILE};
use vs_event_bus::EventBus;
use vs_skill::{ScriptStore, ScriptingSkill, YamlScriptSource};
use vs_storage::Storage;

/// Environment variable naming the configuration directory
const CONFIG_DIR_VAR: &str = "VS_CONFIG_DIR";

/// Section of `configuration.yaml` holding [`SkillSettings`]
const SETTINGS_SECTION: &str = "scripting";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = std::env::var_os(CONFIG_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    info!(config_dir = %config_dir.display(), "Starting voice scripts");

    let settings = load_settings(&config_dir)?;
    let storage_dir = settings
        .storage_dir
        .clone()
        .unwrap_or_else(|| config_dir.clone());

    let bus = Arc::new(EventBus::new());
    let skill = Arc::new(ScriptingSkill::new(
        bus,
        &settings,
        Box::new(YamlScriptSource::new(&config_dir)),
        ScriptStore::new(Storage::new(&storage_dir)),
    ));

    skill
        .initialize()
        .await
        .context("Failed to initialize the scripting skill")?;
    skill.start();
    info!(scripts = skill.list_scripts().len(), "Voice scripts running");

    wait_for_shutdown(&skill).await?;

    info!("Shutting down...");
    skill
        .shutdown()
        .await
        .context("Failed to save interactive scripts")?;
    Ok(())
}

fn load_settings(config_dir: &Path) -> Result<SkillSettings> {
    let path = config_dir.join(CONFIG_FILE);
    if !path.exists() {
        warn!(path = %path.display(), "No configuration file, using defaults");
        return Ok(SkillSettings::default());
    }

    let document = load_yaml(config_dir, CONFIG_FILE)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let settings: SkillSettings = section(&document, SETTINGS_SECTION)?.unwrap_or_default();
    settings.validate()?;
    Ok(settings)
}

#[cfg(unix)]
async fn wait_for_shutdown(skill: &ScriptingSkill) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return Ok(result?),
            _ = hangup.recv() => {
                info!("Reloading scripts");
                match skill.reload() {
                    Ok(report) => info!(%report, "Scripts reloaded"),
                    Err(e) => warn!(error = %e, "Reload failed, keeping current scripts"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_skill: &ScriptingSkill) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
