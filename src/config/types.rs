//! Scenario configuration types
//!
//! Mirrors `.katapod_config.json`:
//!
//! ```json
//! {
//!   "layout": { "terminals": [{ "id": "cqlsh", "name": "cqlsh-editor" }] },
//!   "navigation": {
//!     "onLoadCommands": {
//!       "intro": { "cqlsh": [{ "command": "./wait.sh" }] }
//!     }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_STARTUP_SCRIPT, DEFAULT_TERMINAL_ID, DEFAULT_TERMINAL_NAME, INTRO_STEP_NAME};
use crate::directive::OnLoadCommand;

/// Static scenario configuration, loaded once at start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub layout: LayoutConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

impl ScenarioConfig {
    /// onLoad commands of `step`, grouped by terminal in authored order
    pub fn on_load_commands(&self, step: &str) -> Option<&TerminalCommands> {
        self.navigation.on_load_commands.get(step)
    }
}

/// Legacy scenarios without a config file: one cqlsh terminal that runs
/// the startup script when the intro step opens.
impl Default for ScenarioConfig {
    fn default() -> Self {
        let mut intro = TerminalCommands::new();
        intro.insert(
            DEFAULT_TERMINAL_ID.to_string(),
            vec![OnLoadCommand::new(format!("./{}", DEFAULT_STARTUP_SCRIPT))],
        );
        let mut on_load_commands = IndexMap::new();
        on_load_commands.insert(INTRO_STEP_NAME.to_string(), intro);

        Self {
            layout: LayoutConfig {
                terminals: vec![TerminalSpec::new(DEFAULT_TERMINAL_ID).with_name(DEFAULT_TERMINAL_NAME)],
            },
            navigation: NavigationConfig { on_load_commands },
        }
    }
}

/// Terminal layout section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub terminals: Vec<TerminalSpec>,
}

/// One requested terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TerminalSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Commands bound to each terminal id, keyed in document order
pub type TerminalCommands = IndexMap<String, Vec<OnLoadCommand>>;

/// Navigation section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationConfig {
    #[serde(default)]
    pub on_load_commands: IndexMap<String, TerminalCommands>,
}
