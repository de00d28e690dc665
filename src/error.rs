//! Error types for the scenario runtime
//!
//! Only a handful of conditions are ever surfaced to callers:
//!
//! ```text
//! setup     → TooManyTerminals (fatal, scenario does not start)
//! config    → ConfigError      (unreadable / malformed .katapod_config.json)
//! content   → ContentError     (step page missing, propagated unhandled)
//! host      → HostError        (layout commands failing during setup)
//! trigger   → TriggerError     (undecodable command URI)
//! ```
//!
//! Everything the dispatcher decides (unknown terminal, limit reached,
//! `execute: false`) degrades to a logged no-op and never reaches this module.

use std::path::PathBuf;

use thiserror::Error;

/// Crate result type
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Top-level error for scenario setup and navigation
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Too many terminals: {requested} requested, at most {max} supported")]
    TooManyTerminals { requested: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),
}

/// Errors reading or validating the scenario configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not a katapod scenario")]
    NotAScenario(PathBuf),
}

/// Errors from the step content source
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Step '{step}' not found at {path}")]
    StepNotFound { step: String, path: PathBuf },

    #[error("IO error reading step '{step}': {source}")]
    Io {
        step: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the host (workbench, terminals, display)
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("Host command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Terminal '{name}' failed: {reason}")]
    Terminal { name: String, reason: String },

    #[error("Display failed: {0}")]
    Display(String),
}

/// Errors decoding a command-trigger URI
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid trigger URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unknown katapod command '{0}'")]
    UnknownCommand(String),

    #[error("Payload is not valid percent-encoding: {0}")]
    Decode(String),

    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload array is empty")]
    EmptyPayload,
}
