//! Terminal Layout Allocator
//!
//! Builds the scenario layout: the step panel in the first editor column and
//! one terminal per configured [`TerminalSpec`] stacked in the second column.
//!
//! ## Slot creation sequence
//!
//! For terminal `i` of `n` (in configuration order):
//!
//! ```text
//! focusRightGroupWithoutWrap
//! splitEditorDown            (skipped for the last terminal)
//! createTerminal(view column i + 2)
//! ```
//!
//! Host layout mutations are stateful and non-commutative, so every step is
//! awaited before the next one is issued. The cascading split supports at
//! most eight slots; more is a fatal setup error raised before any terminal
//! exists.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ScenarioConfig, TerminalSpec};
use crate::content::ContentSource;
use crate::error::{Result, ScenarioError};
use crate::host::{
    HostCommand, PanelOptions, TerminalHandle, TerminalOptions, ViewColumn, Workbench,
};
use crate::state::{Components, RuntimeEnvironment, TerminalMap};

/// Maximum number of stacked terminal slots
pub const MAX_TERMINAL_SLOTS: usize = 8;

/// View column of the first terminal; the panel occupies column one
const FIRST_TERMINAL_COLUMN: u8 = 2;

/// Terminals created for one scenario
pub struct TerminalSet {
    /// One handle per terminal spec, in configuration order
    pub terminals: Vec<TerminalHandle>,
    /// Id → handle; with duplicate ids the last spec wins
    pub terminal_map: TerminalMap,
}

/// Fail unless `requested` terminals fit in the available slots
pub fn ensure_slot_capacity(requested: usize) -> Result<()> {
    if requested > MAX_TERMINAL_SLOTS {
        return Err(ScenarioError::TooManyTerminals {
            requested,
            max: MAX_TERMINAL_SLOTS,
        });
    }
    Ok(())
}

/// Create one terminal per [`TerminalSpec`], stacked top to bottom.
pub async fn allocate_terminals(
    workbench: &dyn Workbench,
    specs: &[TerminalSpec],
) -> Result<TerminalSet> {
    ensure_slot_capacity(specs.len())?;

    let total = specs.len();
    let mut terminals = Vec::with_capacity(total);
    let mut terminal_map = TerminalMap::new();

    for (i, spec) in specs.iter().enumerate() {
        workbench
            .execute_command(HostCommand::FocusRightGroupWithoutWrap)
            .await?;
        if i + 1 < total {
            workbench
                .execute_command(HostCommand::SplitEditorDown)
                .await?;
        }

        let name = spec.display_name().to_string();
        debug!(
            terminal_id = %spec.id,
            "Creating terminal {}/\"{}\" ({}/{})",
            spec.id,
            name,
            i + 1,
            total
        );

        let handle = workbench
            .create_terminal(TerminalOptions {
                name,
                view_column: ViewColumn(FIRST_TERMINAL_COLUMN + i as u8),
            })
            .await?;

        if terminal_map.insert(spec.id.clone(), handle.clone()).is_some() {
            warn!(terminal_id = %spec.id, "Duplicate terminal id, later terminal takes over the id");
        }
        terminals.push(handle);
    }

    Ok(TerminalSet {
        terminals,
        terminal_map,
    })
}

/// Prepare the whole layout and return a freshly started environment.
///
/// The slot capacity is checked before the host is touched at all.
pub async fn setup_layout(
    workbench: Arc<dyn Workbench>,
    content: Arc<dyn ContentSource>,
    configuration: ScenarioConfig,
    panel_options: PanelOptions,
) -> Result<RuntimeEnvironment> {
    ensure_slot_capacity(configuration.layout.terminals.len())?;

    debug!("Creating step panel...");
    let panel = workbench.create_panel(panel_options).await?;

    workbench
        .execute_command(HostCommand::EditorLayoutTwoColumns)
        .await?;

    let TerminalSet {
        terminals,
        terminal_map,
    } = allocate_terminals(workbench.as_ref(), &configuration.layout.terminals).await?;

    info!("Layout ready with {} terminal(s)", terminals.len());

    let components = Components {
        terminals,
        terminal_map,
        panel,
        workbench,
        content,
    };
    Ok(RuntimeEnvironment::new(components, configuration))
}
