//! Scenario session
//!
//! [`Scenario`] is the single entry point for every independently-triggered
//! callback of a running scenario (play links, page links, reload, restart).
//! It owns the [`RuntimeEnvironment`] behind an async mutex. Each callback
//! holds the lock for its whole run, so two triggers for the same code block
//! can never interleave between counter check and increment.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{ScenarioConfig, INTRO_STEP_NAME};
use crate::content::ContentSource;
use crate::directive::ResolvedCommand;
use crate::dispatch::{run_command, DispatchOutcome};
use crate::error::Result;
use crate::host::{HostCommand, PanelOptions, Workbench};
use crate::layout::setup_layout;
use crate::navigation::{self, StepLoad};
use crate::state::{RuntimeEnvironment, ScenarioState};
use crate::trigger::{parse_trigger_uri, TargetStep, Trigger};

/// Host commands issued once when the runtime is activated, before start
const BOOTSTRAP_COMMANDS: [HostCommand; 5] = [
    HostCommand::ClearNotifications,
    HostCommand::CloseSidebar,
    HostCommand::CloseAuxiliaryBar,
    HostCommand::ClosePanel,
    HostCommand::CloseAllEditors,
];

/// Result of handling one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Dispatched(DispatchOutcome),
    Loaded(StepLoad),
    /// `None` when nothing had been loaded yet
    Reloaded(Option<StepLoad>),
    Restarted(StepLoad),
}

/// One running scenario
pub struct Scenario {
    workbench: Arc<dyn Workbench>,
    content: Arc<dyn ContentSource>,
    configuration: ScenarioConfig,
    panel_options: PanelOptions,
    env: Mutex<RuntimeEnvironment>,
}

impl Scenario {
    /// Set up the layout and load the intro step.
    ///
    /// Fails without creating any terminal when the layout needs more than
    /// eight slots.
    pub async fn start(
        workbench: Arc<dyn Workbench>,
        content: Arc<dyn ContentSource>,
        configuration: ScenarioConfig,
    ) -> Result<Self> {
        Self::start_with_panel(workbench, content, configuration, PanelOptions::default()).await
    }

    pub async fn start_with_panel(
        workbench: Arc<dyn Workbench>,
        content: Arc<dyn ContentSource>,
        configuration: ScenarioConfig,
        panel_options: PanelOptions,
    ) -> Result<Self> {
        let mut env = setup_layout(
            workbench.clone(),
            content.clone(),
            configuration.clone(),
            panel_options.clone(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Error setting up layout");
            e
        })?;
        debug!(components = ?env.components, "Environment ready");

        navigation::load_page(INTRO_STEP_NAME, &mut env).await?;

        Ok(Self {
            workbench,
            content,
            configuration,
            panel_options,
            env: Mutex::new(env),
        })
    }

    /// Full activation: tidy the workbench, start, then clear notifications
    pub async fn activate(
        workbench: Arc<dyn Workbench>,
        content: Arc<dyn ContentSource>,
        configuration: ScenarioConfig,
    ) -> Result<Self> {
        for command in BOOTSTRAP_COMMANDS {
            workbench.execute_command(command).await?;
        }
        let scenario = Self::start(workbench.clone(), content, configuration).await?;
        workbench
            .execute_command(HostCommand::ClearNotifications)
            .await?;
        info!("Scenario activated");
        Ok(scenario)
    }

    /// `katapod.sendText`
    pub async fn send_text(&self, command: &ResolvedCommand) -> DispatchOutcome {
        let mut env = self.env.lock().await;
        run_command(command, &mut env).await
    }

    /// `katapod.loadPage`
    pub async fn load_page(&self, target: &TargetStep) -> Result<StepLoad> {
        let mut env = self.env.lock().await;
        navigation::load_page(&target.step, &mut env).await
    }

    /// `katapod.reloadPage`
    pub async fn reload_page(&self) -> Result<Option<StepLoad>> {
        let mut env = self.env.lock().await;
        navigation::reload_page(&mut env).await
    }

    /// `katapod.start` on a running scenario: build a fresh layout and
    /// environment, then load the intro step again.
    pub async fn restart(&self) -> Result<StepLoad> {
        let mut env = self.env.lock().await;
        let mut fresh = setup_layout(
            self.workbench.clone(),
            self.content.clone(),
            self.configuration.clone(),
            self.panel_options.clone(),
        )
        .await?;
        let result = navigation::load_page(INTRO_STEP_NAME, &mut fresh).await;
        *env = fresh;
        info!("Scenario restarted");
        result
    }

    pub async fn handle_trigger(&self, trigger: Trigger) -> Result<TriggerOutcome> {
        debug!(command = trigger.command_id(), "Handling trigger");
        match trigger {
            Trigger::SendText(command) => Ok(TriggerOutcome::Dispatched(self.send_text(&command).await)),
            Trigger::LoadPage(target) => self.load_page(&target).await.map(TriggerOutcome::Loaded),
            Trigger::ReloadPage => self.reload_page().await.map(TriggerOutcome::Reloaded),
            Trigger::Start => self.restart().await.map(TriggerOutcome::Restarted),
        }
    }

    /// Decode a `command:katapod.*` URI and handle it
    pub async fn handle_uri(&self, uri: &str) -> Result<TriggerOutcome> {
        let trigger = parse_trigger_uri(uri).map_err(|e| {
            warn!(uri, error = %e, "Undecodable trigger");
            e
        })?;
        self.handle_trigger(trigger).await
    }

    /// Copy of the navigation history and invocation counters
    pub async fn snapshot_state(&self) -> ScenarioState {
        self.env.lock().await.state.clone()
    }

    pub async fn current_step(&self) -> Option<String> {
        self.env.lock().await.current_step().map(str::to_string)
    }

    pub fn configuration(&self) -> &ScenarioConfig {
        &self.configuration
    }
}
