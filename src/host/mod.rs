//! Host capabilities
//!
//! The engine never talks to a concrete UI. Everything it needs from the
//! host is expressed as three injected capabilities:
//!
//! - [`Workbench`]: runs layout commands and creates terminals and the panel
//! - [`Terminal`]: accepts text to execute
//! - [`DisplaySurface`]: shows rendered step HTML and receives messages
//!
//! [`recording::RecordingWorkbench`] implements all three in memory and logs
//! every interaction in order.

pub mod recording;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::directive::CodeBlockId;
use crate::error::HostError;

/// Shared handle to a created terminal, owned by the runtime environment
pub type TerminalHandle = Arc<dyn Terminal>;

/// Shared handle to the display panel
pub type DisplayHandle = Arc<dyn DisplaySurface>;

// =============================================================================
// HOST COMMANDS
// =============================================================================

/// Layout and housekeeping commands the engine asks the host to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    EditorLayoutTwoColumns,
    FocusRightGroupWithoutWrap,
    SplitEditorDown,
    ClearNotifications,
    CloseSidebar,
    CloseAuxiliaryBar,
    ClosePanel,
    CloseAllEditors,
}

impl HostCommand {
    /// Host-side command identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::EditorLayoutTwoColumns => "workbench.action.editorLayoutTwoColumns",
            Self::FocusRightGroupWithoutWrap => "workbench.action.focusRightGroupWithoutWrap",
            Self::SplitEditorDown => "workbench.action.splitEditorDown",
            Self::ClearNotifications => "notifications.clearAll",
            Self::CloseSidebar => "workbench.action.closeSidebar",
            Self::CloseAuxiliaryBar => "workbench.action.closeAuxiliaryBar",
            Self::ClosePanel => "workbench.action.closePanel",
            Self::CloseAllEditors => "workbench.action.closeAllEditors",
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Editor column a panel or terminal is placed in (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewColumn(pub u8);

impl ViewColumn {
    pub const ONE: ViewColumn = ViewColumn(1);
}

/// Options for creating one terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOptions {
    pub name: String,
    pub view_column: ViewColumn,
}

/// Options for creating the step panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOptions {
    pub view_type: String,
    pub title: String,
    pub view_column: ViewColumn,
    pub enable_command_uris: bool,
    pub enable_scripts: bool,
    pub retain_context_when_hidden: bool,
    pub enable_find_widget: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            view_type: "datastax.katapod".to_string(),
            title: "KataPod".to_string(),
            view_column: ViewColumn::ONE,
            enable_command_uris: true,
            enable_scripts: true,
            retain_context_when_hidden: true,
            enable_find_widget: true,
        }
    }
}

// =============================================================================
// PANEL MESSAGES
// =============================================================================

/// Messages posted to the rendered step page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PanelMessage {
    ScrollToTop,
    MarkExecutedBlock {
        #[serde(rename = "blockId")]
        block_id: CodeBlockId,
    },
}

// =============================================================================
// CAPABILITY TRAITS
// =============================================================================

/// A terminal that accepts text to execute
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Display name of the terminal
    fn name(&self) -> &str;

    /// Send `text`; with `add_new_line` the host submits it for execution
    async fn send_text(&self, text: &str, add_new_line: bool) -> Result<(), HostError>;
}

/// The panel showing the current step
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    async fn set_html(&self, html: String) -> Result<(), HostError>;

    async fn post_message(&self, message: PanelMessage) -> Result<(), HostError>;

    /// Map a local file into a URI the panel is allowed to load
    fn resource_uri(&self, path: &Path) -> String {
        path.display().to_string()
    }
}

/// The host workbench: layout commands plus terminal and panel factories
#[async_trait]
pub trait Workbench: Send + Sync {
    async fn execute_command(&self, command: HostCommand) -> Result<(), HostError>;

    async fn create_terminal(&self, options: TerminalOptions) -> Result<TerminalHandle, HostError>;

    async fn create_panel(&self, options: PanelOptions) -> Result<DisplayHandle, HostError>;
}
