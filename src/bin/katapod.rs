//! KataPod CLI
//!
//! Inspects and dry-runs scenarios without an editor host:
//! 1. `check`  - scenario detection and configuration summary
//! 2. `render` - the HTML of one step page
//! 3. `walk`   - run the scenario against the recording host and print
//!    every host interaction as one JSON object per line
//!
//! Usage:
//!   katapod check ./my-scenario
//!   katapod render ./my-scenario intro
//!   katapod walk ./my-scenario --step step2 --step step3 --reload
//!
//! Logs go to stderr; set RUST_LOG (default `katapod=info`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use katapod::config::{ConfigLoader, SCENARIO_DIR_ENV};
use katapod::content::{ContentSource, FsContentSource};
use katapod::host::recording::RecordingWorkbench;
use katapod::host::{PanelOptions, Workbench};
use katapod::layout::ensure_slot_capacity;
use katapod::rendering::render_step;
use katapod::trigger::TargetStep;
use katapod::Scenario;

#[derive(Parser)]
#[command(name = "katapod")]
#[command(version)]
#[command(about = "Inspect and dry-run step-based terminal scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the scenario and validate its configuration
    Check {
        /// Scenario directory
        #[arg(env = SCENARIO_DIR_ENV, default_value = ".")]
        dir: PathBuf,
    },

    /// Print the rendered HTML of one step
    Render {
        /// Scenario directory
        dir: PathBuf,

        /// Step name (file name without .md)
        step: String,
    },

    /// Run the scenario headlessly and print recorded host events
    Walk {
        /// Scenario directory
        #[arg(env = SCENARIO_DIR_ENV, default_value = ".")]
        dir: PathBuf,

        /// Steps to load after intro, in order
        #[arg(long, short = 's')]
        step: Vec<String>,

        /// Reload the last step at the end
        #[arg(long, short = 'r')]
        reload: bool,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("katapod=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { dir } => cmd_check(dir).await,
        Commands::Render { dir, step } => cmd_render(dir, &step).await,
        Commands::Walk { dir, step, reload } => cmd_walk(dir, step, reload).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_check(dir: PathBuf) -> Result<()> {
    let loader = ConfigLoader::new(&dir);
    let config = loader
        .load_scenario()
        .await
        .with_context(|| format!("Checking {}", dir.display()))?;
    ensure_slot_capacity(config.layout.terminals.len())?;

    println!("OK {} is a katapod scenario", dir.display());
    println!("Terminals ({}):", config.layout.terminals.len());
    for spec in &config.layout.terminals {
        println!("  {} ({})", spec.id, spec.display_name());
    }
    println!("onLoad commands:");
    for (step, per_terminal) in &config.navigation.on_load_commands {
        for (terminal_id, commands) in per_terminal {
            println!("  {} -> {}: {} command(s)", step, terminal_id, commands.len());
        }
    }
    Ok(())
}

async fn cmd_render(dir: PathBuf, step: &str) -> Result<()> {
    let content = FsContentSource::new(&dir);
    let markdown = content
        .read_step(step)
        .await
        .with_context(|| format!("Reading step '{}'", step))?;

    let workbench = RecordingWorkbench::new();
    let panel = workbench.create_panel(PanelOptions::default()).await?;
    let rendered = render_step(step, &markdown, &content, panel.as_ref());

    println!("{}", rendered.html);
    Ok(())
}

async fn cmd_walk(dir: PathBuf, steps: Vec<String>, reload: bool) -> Result<()> {
    let config = ConfigLoader::new(&dir)
        .load_scenario()
        .await
        .with_context(|| format!("Loading scenario {}", dir.display()))?;

    let workbench = Arc::new(RecordingWorkbench::new());
    let content = Arc::new(FsContentSource::new(&dir));

    let walk = async {
        let scenario = Scenario::activate(workbench.clone(), content, config).await?;
        for step in steps {
            scenario.load_page(&TargetStep::new(step)).await?;
        }
        if reload {
            scenario.reload_page().await?;
        }
        katapod::Result::Ok(())
    };
    // Print what happened even when the walk stopped early
    let outcome = walk.await;

    for event in workbench.events() {
        println!("{}", serde_json::to_string(&event)?);
    }

    outcome.context("Scenario walk failed")
}
