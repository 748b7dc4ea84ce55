//! Script engine
//!
//! Scripts map trigger phrases to a command written in a small action
//! language. This crate turns commands into typed actions, keeps the live set
//! of scripts, and runs them one step at a time.
//!
//! # Action language
//!
//! - plain text is spoken as is, `{name}` is replaced by a captured value
//! - `one_of(a|b|c)` speaks one item picked at random
//! - `sleep(2.5)` pauses for the given number of seconds
//! - `&!` ends a step and waits for playback to finish before the next one
//! - `&&` ends a step and moves on after a short pause
//!
//! # Key Types
//!
//! - [`Action`] - one parsed step
//! - [`ScriptEntity`] - a named script with its triggers and actions
//! - [`ScriptRegistry`] - the live set of scripts, with declarative reconciliation
//! - [`ScriptRun`] - the per-run state machine
//! - [`ScriptExecutor`] - drives runs on the event bus

pub mod action;
pub mod executor;
pub mod parser;
pub mod registry;
pub mod runner;
pub mod script;
pub mod template;

pub use action::{Action, ActionKind};
pub use executor::{RunHandle, ScriptExecutor};
pub use parser::parse;
pub use registry::{
    ReconcileReport, RegistryError, RegistryResult, ScriptRegistry, TriggerRegistrar,
};
pub use runner::{RunState, RunStatus, RunnerConfig, ScriptRun, Step, Suspension, Wakeup};
pub use script::{DeclarativeScripts, ScriptConfig, ScriptEntity, ScriptError, ScriptOrigin};
