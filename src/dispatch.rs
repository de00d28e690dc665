//! Command Dispatcher
//!
//! Applies execution policy to a [`ResolvedCommand`] and sends it to a
//! terminal. Policy decisions never fail the caller; each one degrades to a
//! logged no-op and is reported through [`DispatchOutcome`].
//!
//! ## Order of operations
//!
//! 1. `execute: false` → skip
//! 2. pick the terminal: `terminalId` if known, else the first terminal
//! 3. claim an invocation (check + increment, no suspension in between)
//! 4. run `macrosBefore` in order
//! 5. send the command text
//! 6. tell the panel the block was executed
//!
//! A claimed invocation stays counted even when the terminal send fails.

use tracing::{debug, warn};

use crate::config::TerminalCommands;
use crate::directive::{CodeBlockId, Macro, ResolvedCommand, CTRL_C};
use crate::host::{HostCommand, PanelMessage, TerminalHandle};
use crate::state::{InvocationClaim, RuntimeEnvironment};

/// What the dispatcher did with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Sent to `terminal`; `invocations` is the count after this run
    Executed { terminal: String, invocations: u32 },
    /// The command is marked `execute: false`
    NotExecutable,
    /// The invocation limit was already reached
    LimitReached { invocations: u32 },
    /// The environment has no terminal at all
    NoTerminal,
}

impl DispatchOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

/// Dispatch one command against the environment
pub async fn run_command(command: &ResolvedCommand, env: &mut RuntimeEnvironment) -> DispatchOutcome {
    if !command.execute {
        debug!(
            code_block_id = %command.code_block_id,
            "Refusing to execute {} (\"execute\" flag set to false)",
            command.to_log_json()
        );
        return DispatchOutcome::NotExecutable;
    }

    if let Some(terminal_id) = command.terminal_id.as_deref() {
        if !env.components.terminal_map.contains_key(terminal_id) {
            debug!(terminal_id, "Unknown terminal id, falling back to the first terminal");
        }
    }
    let terminal: TerminalHandle = match env.resolve_terminal(command.terminal_id.as_deref()) {
        Some(terminal) => terminal.clone(),
        None => {
            warn!(
                code_block_id = %command.code_block_id,
                "No terminal available, dropping {}",
                command.to_log_json()
            );
            return DispatchOutcome::NoTerminal;
        }
    };

    let invocations_so_far = match env
        .state
        .invocation_counts
        .claim(&command.code_block_id, command.max_invocations)
    {
        InvocationClaim::Granted { invocations_so_far } => invocations_so_far,
        InvocationClaim::Refused { invocations_so_far } => {
            debug!(
                code_block_id = %command.code_block_id,
                invocations = invocations_so_far,
                "Refusing to execute {} (invocations detected: {})",
                command.to_log_json(),
                invocations_so_far
            );
            return DispatchOutcome::LimitReached {
                invocations: invocations_so_far,
            };
        }
    };

    for macro_before in &command.macros_before {
        run_macro(&terminal, *macro_before).await;
    }

    debug!(
        code_block_id = %command.code_block_id,
        terminal = terminal.name(),
        "Running {} (invocations until now: {})",
        command.to_log_json(),
        invocations_so_far
    );
    if let Err(e) = terminal.send_text(&command.command, true).await {
        warn!(code_block_id = %command.code_block_id, error = %e, "Terminal send failed");
    }

    mark_executed(env, &command.code_block_id).await;

    DispatchOutcome::Executed {
        terminal: terminal.name().to_string(),
        invocations: invocations_so_far + 1,
    }
}

async fn run_macro(terminal: &TerminalHandle, macro_before: Macro) {
    debug!(terminal = terminal.name(), "Running macro {:?}", macro_before);
    match macro_before {
        Macro::CtrlC => {
            if let Err(e) = terminal.send_text(CTRL_C, false).await {
                warn!(error = %e, "ctrl_c macro failed");
            }
        }
        Macro::NoOp | Macro::Unknown => {}
    }
}

/// Notify the panel that a block ran. Failures are logged only.
async fn mark_executed(env: &RuntimeEnvironment, code_block_id: &CodeBlockId) {
    if let Err(e) = env
        .components
        .workbench
        .execute_command(HostCommand::ClearNotifications)
        .await
    {
        warn!(error = %e, "Clearing notifications failed");
    }
    let message = PanelMessage::MarkExecutedBlock {
        block_id: code_block_id.clone(),
    };
    if let Err(e) = env.components.panel.post_message(message).await {
        warn!(%code_block_id, error = %e, "Marking block as executed failed");
    }
}

/// Dispatch a step's terminal-bound commands in order: terminals in
/// authored order, then each terminal's commands in sequence.
pub async fn run_commands_per_terminal(
    step: &str,
    commands: &TerminalCommands,
    env: &mut RuntimeEnvironment,
    log_context: &str,
) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::new();
    for (terminal_id, on_load_commands) in commands {
        for on_load in on_load_commands {
            debug!(
                "[{}] running map entry {} => {}",
                log_context,
                terminal_id,
                serde_json::to_string(on_load).unwrap_or_default()
            );
            let resolved = on_load.resolve(step, terminal_id);
            outcomes.push(run_command(&resolved, env).await);
        }
    }
    outcomes
}

/// Dispatch the onLoad commands configured for `step`
pub async fn run_on_load_commands(step: &str, env: &mut RuntimeEnvironment) -> Vec<DispatchOutcome> {
    let commands = env
        .configuration
        .on_load_commands(step)
        .cloned()
        .unwrap_or_default();
    let log_context = format!("onLoad[{}]", step);
    run_commands_per_terminal(step, &commands, env, &log_context).await
}
