//! Scenario state
//!
//! Everything that belongs to one running scenario lives in a single
//! [`RuntimeEnvironment`] value that is threaded through every operation:
//!
//! - `components`: host capabilities owned for the whole session
//! - `configuration`: the static scenario configuration
//! - `state`: navigation history and per-code-block invocation counters
//!
//! History and counters are never reset during a session. That is what
//! makes invocation limits survive step reloads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ScenarioConfig;
use crate::content::ContentSource;
use crate::directive::{CodeBlockId, MaxInvocations};
use crate::host::{DisplayHandle, TerminalHandle, Workbench};

/// Terminal id → terminal handle
pub type TerminalMap = HashMap<String, TerminalHandle>;

// =============================================================================
// STEP HISTORY
// =============================================================================

/// One entry of the navigation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    /// Placeholder present before the first step is loaded
    NoStepYet,
    Step(String),
}

impl HistoryEntry {
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::NoStepYet => None,
            Self::Step(step) => Some(step),
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStepYet => f.write_str("<no step yet>"),
            Self::Step(step) => f.write_str(step),
        }
    }
}

static NO_STEP_YET: HistoryEntry = HistoryEntry::NoStepYet;

/// Append-only log of visited steps. Reloads re-append; nothing is ever removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepHistory(Vec<HistoryEntry>);

impl StepHistory {
    /// History holding only the sentinel
    pub fn new() -> Self {
        Self(vec![HistoryEntry::NoStepYet])
    }

    pub fn record(&mut self, step: impl Into<String>) {
        self.0.push(HistoryEntry::Step(step.into()));
    }

    /// Last entry; the sentinel only before the first load
    pub fn current(&self) -> &HistoryEntry {
        self.0.last().unwrap_or(&NO_STEP_YET)
    }

    /// Name of the current step, if a real step has been loaded
    pub fn current_step(&self) -> Option<&str> {
        self.current().step()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StepHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join(" => "))
    }
}

// =============================================================================
// INVOCATION COUNTS
// =============================================================================

/// Outcome of asking for one more invocation of a code block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationClaim {
    /// Allowed; the counter now holds `invocations_so_far + 1`
    Granted { invocations_so_far: u32 },
    /// Limit reached; the counter is unchanged
    Refused { invocations_so_far: u32 },
}

/// Per-code-block dispatch counters. Entries appear on the first granted attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InvocationCounts(HashMap<CodeBlockId, u32>);

impl InvocationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &CodeBlockId) -> u32 {
        self.0.get(id).copied().unwrap_or(0)
    }

    /// Check the limit and count the attempt in one step.
    ///
    /// Must stay synchronous: no suspension point between check and increment.
    pub fn claim(&mut self, id: &CodeBlockId, max: MaxInvocations) -> InvocationClaim {
        let invocations_so_far = self.get(id);
        if !max.permits(invocations_so_far) {
            return InvocationClaim::Refused { invocations_so_far };
        }
        *self.0.entry(id.clone()).or_insert(0) += 1;
        InvocationClaim::Granted { invocations_so_far }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// RUNTIME ENVIRONMENT
// =============================================================================

/// Mutable navigation state of one session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub step_history: StepHistory,
    pub invocation_counts: InvocationCounts,
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Host capabilities owned by the session
#[derive(Clone)]
pub struct Components {
    /// One handle per configured terminal, in configuration order
    pub terminals: Vec<TerminalHandle>,
    pub terminal_map: TerminalMap,
    pub panel: DisplayHandle,
    pub workbench: Arc<dyn Workbench>,
    pub content: Arc<dyn ContentSource>,
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.terminal_map.keys().collect();
        ids.sort();
        f.debug_struct("Components")
            .field(
                "terminals",
                &self.terminals.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("terminal_map", &ids)
            .finish_non_exhaustive()
    }
}

/// Everything one running scenario needs, passed explicitly to every operation
#[derive(Debug, Clone)]
pub struct RuntimeEnvironment {
    pub components: Components,
    pub configuration: ScenarioConfig,
    pub state: ScenarioState,
}

impl RuntimeEnvironment {
    pub fn new(components: Components, configuration: ScenarioConfig) -> Self {
        Self {
            components,
            configuration,
            state: ScenarioState::new(),
        }
    }

    /// Append `step` to the history
    pub fn record_step(&mut self, step: impl Into<String>) {
        self.state.step_history.record(step);
    }

    pub fn current_step(&self) -> Option<&str> {
        self.state.step_history.current_step()
    }

    /// Terminal for `terminal_id`, falling back to the first configured one
    pub fn resolve_terminal(&self, terminal_id: Option<&str>) -> Option<&TerminalHandle> {
        terminal_id
            .and_then(|id| self.components.terminal_map.get(id))
            .or_else(|| self.components.terminals.first())
    }
}
