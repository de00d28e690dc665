//! KataPod - step-based scenario runtime
//!
//! Drives guided walkthroughs: markdown step pages embed command snippets
//! that run in one or more attached terminals.
//!
//! ## Architecture
//! Every UI callback flows through one [`Scenario`]:
//! Trigger URI -> Trigger -> Step Loader / Dispatcher -> Host capabilities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use katapod::config::ConfigLoader;
//! use katapod::content::FsContentSource;
//! use katapod::host::recording::RecordingWorkbench;
//! use katapod::Scenario;
//!
//! # async fn run() -> katapod::Result<()> {
//! let loader = ConfigLoader::new("./my-scenario");
//! let config = loader.load_scenario().await?;
//! let scenario = Scenario::activate(
//!     Arc::new(RecordingWorkbench::new()),
//!     Arc::new(FsContentSource::new("./my-scenario")),
//!     config,
//! )
//! .await?;
//! scenario.handle_uri("command:katapod.reloadPage").await?;
//! # Ok(())
//! # }
//! ```

// Error handling
pub mod error;

// Scenario configuration and loading
pub mod config;

// Host capabilities (workbench, terminals, panel) and the recording host
pub mod host;

// Step content and rendering
pub mod content;
pub mod rendering;

// Engine: directive parsing, layout, state, dispatch, navigation
pub mod directive;
pub mod dispatch;
pub mod layout;
pub mod navigation;
pub mod state;

// UI trigger protocol and the session entry point
pub mod scenario;
pub mod trigger;

pub use directive::{parse_code_block, CodeBlockId, MaxInvocations, ResolvedCommand};
pub use dispatch::DispatchOutcome;
pub use error::{Result, ScenarioError};
pub use scenario::{Scenario, TriggerOutcome};
pub use state::RuntimeEnvironment;
pub use trigger::Trigger;
