//! Scenario configuration
//!
//! - `types`: serde model of `.katapod_config.json`
//! - `loader`: scenario detection and config loading

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{LayoutConfig, NavigationConfig, ScenarioConfig, TerminalCommands, TerminalSpec};

/// Scenario configuration file, relative to the scenario directory
pub const CONFIG_FILE_NAME: &str = ".katapod_config.json";

/// Legacy marker file for scenarios without a config file
pub const GITPOD_YAML_FILE_NAME: &str = ".gitpod.yml";

/// Both must appear on one `.gitpod.yml` line for legacy detection
pub const SCENARIO_MATCH_FRAGMENTS: [&str; 2] = [".vsix", "katapod"];

pub const DEFAULT_STARTUP_SCRIPT: &str = "wait.sh";
pub const DEFAULT_TERMINAL_NAME: &str = "cqlsh-editor";
pub const DEFAULT_TERMINAL_ID: &str = "cqlsh";

/// First step loaded when a scenario starts
pub const INTRO_STEP_NAME: &str = "intro";

/// Environment variable overriding the scenario directory
pub const SCENARIO_DIR_ENV: &str = "KATAPOD_SCENARIO_DIR";
