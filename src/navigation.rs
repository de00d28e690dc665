//! Step Loader
//!
//! Page transitions: record the step, render its page, fire the step's
//! onLoad commands and reset the panel scroll position.
//!
//! ```text
//! load_page(step)
//!   ├─ history.record(step)
//!   ├─ content.read_step(step)      (error propagates; history keeps the entry)
//!   ├─ render + panel.set_html       (failure is logged only)
//!   ├─ dispatch onLoad commands     (terminal order as authored)
//!   └─ clear notifications, post scroll_to_top
//! ```
//!
//! onLoad commands default to a single invocation and their code block id
//! depends only on step and terminal, so reloading a step never re-runs
//! them.

use tracing::{debug, info, warn};

use crate::dispatch::{run_on_load_commands, DispatchOutcome};
use crate::error::Result;
use crate::host::{HostCommand, PanelMessage};
use crate::rendering::{render_step, RenderedStep};
use crate::state::RuntimeEnvironment;

/// What a page load did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLoad {
    pub step: String,
    pub rendered: RenderedStep,
    /// One outcome per configured onLoad command, in dispatch order
    pub on_load: Vec<DispatchOutcome>,
}

/// Load `step` into the panel
pub async fn load_page(step: &str, env: &mut RuntimeEnvironment) -> Result<StepLoad> {
    env.record_step(step);
    debug!(step, "[loadPage] Step history: {}", env.state.step_history);

    let markdown = env.components.content.read_step(step).await?;
    let rendered = render_step(
        step,
        &markdown,
        env.components.content.as_ref(),
        env.components.panel.as_ref(),
    );
    if let Err(e) = env.components.panel.set_html(rendered.html.clone()).await {
        warn!(step, error = %e, "Showing step page failed");
    }

    let on_load = run_on_load_commands(step, env).await;

    if let Err(e) = env
        .components
        .workbench
        .execute_command(HostCommand::ClearNotifications)
        .await
    {
        warn!(error = %e, "Clearing notifications failed");
    }
    if let Err(e) = env.components.panel.post_message(PanelMessage::ScrollToTop).await {
        warn!(step, error = %e, "Scroll reset failed");
    }

    info!(
        step,
        inline_commands = rendered.commands.len(),
        on_load_commands = on_load.len(),
        "Loaded step"
    );

    Ok(StepLoad {
        step: step.to_string(),
        rendered,
        on_load,
    })
}

/// Load the current step again. `None` before any step was loaded.
pub async fn reload_page(env: &mut RuntimeEnvironment) -> Result<Option<StepLoad>> {
    let Some(step) = env.current_step().map(str::to_string) else {
        debug!("Reload requested before any step was loaded, ignoring");
        return Ok(None);
    };
    load_page(&step, env).await.map(Some)
}
