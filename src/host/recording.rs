//! In-memory host that records every interaction
//!
//! Backs the headless `katapod walk` dry-run and the test suites. All
//! terminals and the panel created by one [`RecordingWorkbench`] append to
//! the same ordered event log, so tests can assert on cross-component
//! ordering (e.g. macro before command, split before create).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use super::{
    DisplayHandle, DisplaySurface, HostCommand, PanelMessage, PanelOptions, TerminalHandle,
    TerminalOptions, Terminal, ViewColumn, Workbench,
};
use crate::error::HostError;

/// One recorded host interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Command {
        command: String,
    },
    PanelCreated {
        title: String,
    },
    TerminalCreated {
        name: String,
        view_column: ViewColumn,
    },
    TerminalSend {
        terminal: String,
        text: String,
        add_new_line: bool,
    },
    PanelHtml {
        html: String,
    },
    PanelMessage {
        message: PanelMessage,
    },
}

type EventLog = Arc<Mutex<Vec<HostEvent>>>;

fn lock(log: &EventLog) -> MutexGuard<'_, Vec<HostEvent>> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Workbench recording commands, terminal creations, sends and panel traffic
#[derive(Debug, Clone, Default)]
pub struct RecordingWorkbench {
    log: EventLog,
    failing_terminals: HashSet<String>,
    failing_panel: bool,
}

impl RecordingWorkbench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminals created with this name reject every send (the attempt is still recorded)
    pub fn with_failing_terminal(mut self, name: impl Into<String>) -> Self {
        self.failing_terminals.insert(name.into());
        self
    }

    /// The panel rejects every html update and message (attempts are still recorded)
    pub fn with_failing_panel(mut self) -> Self {
        self.failing_panel = true;
        self
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.log).clone()
    }

    /// Host command ids in execution order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.log)
            .iter()
            .filter_map(|e| match e {
                HostEvent::Command { command } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(terminal name, text, add_new_line)` for every send, in order
    pub fn sends(&self) -> Vec<(String, String, bool)> {
        lock(&self.log)
            .iter()
            .filter_map(|e| match e {
                HostEvent::TerminalSend {
                    terminal,
                    text,
                    add_new_line,
                } => Some((terminal.clone(), text.clone(), *add_new_line)),
                _ => None,
            })
            .collect()
    }

    /// Sends addressed to one terminal
    pub fn sends_to(&self, terminal: &str) -> Vec<String> {
        self.sends()
            .into_iter()
            .filter(|(name, _, _)| name == terminal)
            .map(|(_, text, _)| text)
            .collect()
    }

    /// Names of created terminals, in creation order
    pub fn created_terminals(&self) -> Vec<String> {
        lock(&self.log)
            .iter()
            .filter_map(|e| match e {
                HostEvent::TerminalCreated { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages posted to the panel, in order
    pub fn panel_messages(&self) -> Vec<PanelMessage> {
        lock(&self.log)
            .iter()
            .filter_map(|e| match e {
                HostEvent::PanelMessage { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most recent HTML set on the panel
    pub fn last_html(&self) -> Option<String> {
        lock(&self.log).iter().rev().find_map(|e| match e {
            HostEvent::PanelHtml { html } => Some(html.clone()),
            _ => None,
        })
    }

    fn record(&self, event: HostEvent) {
        lock(&self.log).push(event);
    }
}

#[async_trait]
impl Workbench for RecordingWorkbench {
    async fn execute_command(&self, command: HostCommand) -> Result<(), HostError> {
        self.record(HostEvent::Command {
            command: command.id().to_string(),
        });
        Ok(())
    }

    async fn create_terminal(&self, options: TerminalOptions) -> Result<TerminalHandle, HostError> {
        self.record(HostEvent::TerminalCreated {
            name: options.name.clone(),
            view_column: options.view_column,
        });
        Ok(Arc::new(RecordingTerminal {
            fails: self.failing_terminals.contains(&options.name),
            name: options.name,
            log: self.log.clone(),
        }))
    }

    async fn create_panel(&self, options: PanelOptions) -> Result<DisplayHandle, HostError> {
        self.record(HostEvent::PanelCreated {
            title: options.title,
        });
        Ok(Arc::new(RecordingPanel {
            fails: self.failing_panel,
            log: self.log.clone(),
        }))
    }
}

/// Terminal appending its sends to the shared log
#[derive(Debug)]
pub struct RecordingTerminal {
    name: String,
    fails: bool,
    log: EventLog,
}

#[async_trait]
impl Terminal for RecordingTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_text(&self, text: &str, add_new_line: bool) -> Result<(), HostError> {
        lock(&self.log).push(HostEvent::TerminalSend {
            terminal: self.name.clone(),
            text: text.to_string(),
            add_new_line,
        });
        if self.fails {
            return Err(HostError::Terminal {
                name: self.name.clone(),
                reason: "terminal rejected input".to_string(),
            });
        }
        Ok(())
    }
}

/// Panel appending html updates and messages to the shared log
#[derive(Debug)]
pub struct RecordingPanel {
    fails: bool,
    log: EventLog,
}

impl RecordingPanel {
    fn outcome(&self) -> Result<(), HostError> {
        if self.fails {
            return Err(HostError::Display("panel disposed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DisplaySurface for RecordingPanel {
    async fn set_html(&self, html: String) -> Result<(), HostError> {
        lock(&self.log).push(HostEvent::PanelHtml { html });
        self.outcome()
    }

    async fn post_message(&self, message: PanelMessage) -> Result<(), HostError> {
        lock(&self.log).push(HostEvent::PanelMessage { message });
        self.outcome()
    }
}
