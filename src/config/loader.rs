//! Configuration loader
//!
//! Locates a scenario directory, decides whether it is a katapod scenario
//! and loads `.katapod_config.json`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::ScenarioConfig;
use super::{
    CONFIG_FILE_NAME, GITPOD_YAML_FILE_NAME, SCENARIO_DIR_ENV, SCENARIO_MATCH_FRAGMENTS,
};
use crate::error::ConfigError;

pub struct ConfigLoader {
    scenario_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(scenario_dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario_dir: scenario_dir.into(),
        }
    }

    /// Create loader from KATAPOD_SCENARIO_DIR env var or default to the current directory
    pub fn from_env() -> Self {
        match std::env::var(SCENARIO_DIR_ENV) {
            Ok(dir) => Self::new(dir),
            Err(_) => Self::new("."),
        }
    }

    pub fn scenario_dir(&self) -> &Path {
        &self.scenario_dir
    }

    /// Full path of a file inside the scenario directory
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.scenario_dir.join(file_name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.file_path(CONFIG_FILE_NAME)
    }

    /// Decide whether the directory holds a katapod scenario.
    ///
    /// Decision flow (scenarios predating the config file must keep working):
    /// 1. a `.katapod_config.json` exists → scenario
    /// 2. else a `.gitpod.yml` exists with a line mentioning both `.vsix`
    ///    and `katapod` (case-insensitive) → scenario
    /// 3. otherwise → not a scenario
    pub async fn is_katapod_scenario(&self) -> bool {
        if tokio::fs::metadata(self.config_path()).await.is_ok() {
            return true;
        }

        let gitpod_yaml = self.file_path(GITPOD_YAML_FILE_NAME);
        match tokio::fs::read_to_string(&gitpod_yaml).await {
            Ok(content) => content.lines().map(str::to_lowercase).any(|line| {
                SCENARIO_MATCH_FRAGMENTS
                    .iter()
                    .all(|fragment| line.contains(fragment))
            }),
            Err(_) => false,
        }
    }

    /// Load the configuration, falling back to the default single-terminal
    /// layout when no config file exists.
    pub async fn load(&self) -> Result<ScenarioConfig, ConfigError> {
        let path = self.config_path();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} found, using default configuration", path.display());
                return Ok(ScenarioConfig::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config: ScenarioConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?;

        info!(
            "Loaded {} with {} terminal(s) and onLoad commands for {} step(s)",
            path.display(),
            config.layout.terminals.len(),
            config.navigation.on_load_commands.len()
        );

        Ok(config)
    }

    /// Load the configuration of a directory that must be a scenario
    pub async fn load_scenario(&self) -> Result<ScenarioConfig, ConfigError> {
        if !self.is_katapod_scenario().await {
            return Err(ConfigError::NotAScenario(self.scenario_dir.clone()));
        }
        self.load().await
    }
}
