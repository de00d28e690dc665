//! Shared fixtures for the scenario integration tests
//!
//! Builds throwaway scenario directories on disk and starts them against the
//! recording host.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use katapod::config::ConfigLoader;
use katapod::content::FsContentSource;
use katapod::host::recording::RecordingWorkbench;
use katapod::Scenario;

/// A scenario directory under construction
pub struct ScenarioDir {
    dir: TempDir,
}

impl ScenarioDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn with_config(self, json: &str) -> Self {
        std::fs::write(self.path().join(".katapod_config.json"), json).unwrap();
        self
    }

    pub fn with_gitpod_yaml(self, yaml: &str) -> Self {
        std::fs::write(self.path().join(".gitpod.yml"), yaml).unwrap();
        self
    }

    pub fn with_step(self, step: &str, markdown: &str) -> Self {
        std::fs::write(self.path().join(format!("{}.md", step)), markdown).unwrap();
        self
    }

    /// Load the configuration and activate the scenario
    pub async fn activate(&self) -> (Arc<RecordingWorkbench>, Scenario) {
        let config = ConfigLoader::new(self.path()).load_scenario().await.unwrap();
        let workbench = Arc::new(RecordingWorkbench::new());
        let scenario = Scenario::activate(
            workbench.clone(),
            Arc::new(FsContentSource::new(self.path())),
            config,
        )
        .await
        .unwrap();
        (workbench, scenario)
    }
}

/// Extract every `command:katapod.sendText?...` link from rendered HTML
pub fn play_links(html: &str) -> Vec<String> {
    html.match_indices("command:katapod.sendText?")
        .map(|(start, _)| {
            let rest = &html[start..];
            let end = rest.find('"').unwrap_or(rest.len());
            rest[..end].to_string()
        })
        .collect()
}

/// Two-terminal scenario with onLoad commands on intro and step2
pub const TWO_TERMINAL_CONFIG: &str = r#"{
    "layout": {
        "terminals": [
            {"id": "cqlsh", "name": "cqlsh-editor"},
            {"id": "shell", "name": "Shell"}
        ]
    },
    "navigation": {
        "onLoadCommands": {
            "intro": {
                "shell": [{"command": "./wait.sh"}],
                "cqlsh": [{"command": "cqlsh", "macrosBefore": ["ctrl_c"]}]
            },
            "step2": {
                "shell": [{"command": "clear", "maxInvocations": "unlimited"}]
            }
        }
    }
}"#;

pub const INTRO_MD: &str = "# Welcome

Run this once:

```
### {\"terminalId\": \"shell\", \"maxInvocations\": 1}
./setup.sh
```

And this as often as you like:

```
### cqlsh
SELECT * FROM system.local;
```

[Continue](command:katapod.loadPage?step2)
";

pub const STEP2_MD: &str = "# Step two

```
ls -la
```
";
