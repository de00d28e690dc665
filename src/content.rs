//! Step content sources
//!
//! A step named `setup` is the markdown page `setup.md` in the scenario
//! directory. Read failures propagate to the caller unhandled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ContentError;

/// File extension of step pages
pub const STEP_FILE_EXTENSION: &str = "md";

/// Provides the markdown of a step
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read_step(&self, step: &str) -> Result<String, ContentError>;

    /// Location of a file referenced from step content (e.g. a local image)
    fn resolve_path(&self, relative: &str) -> PathBuf {
        PathBuf::from(relative)
    }
}

/// Reads `<scenario_dir>/<step>.md`
#[derive(Debug, Clone)]
pub struct FsContentSource {
    base_dir: PathBuf,
}

impl FsContentSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the page for `step`
    pub fn step_path(&self, step: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", step, STEP_FILE_EXTENSION))
    }
}

#[async_trait]
impl ContentSource for FsContentSource {
    async fn read_step(&self, step: &str) -> Result<String, ContentError> {
        let path = self.step_path(step);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ContentError::StepNotFound {
                step: step.to_string(),
                path,
            }),
            Err(source) => Err(ContentError::Io {
                step: step.to_string(),
                source,
            }),
        }
    }

    fn resolve_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }
}

/// Fixed set of pages held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource {
    pages: HashMap<String, String>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.pages.insert(step.into(), markdown.into());
        self
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn read_step(&self, step: &str) -> Result<String, ContentError> {
        self.pages
            .get(step)
            .cloned()
            .ok_or_else(|| ContentError::StepNotFound {
                step: step.to_string(),
                path: PathBuf::from(format!("{}.{}", step, STEP_FILE_EXTENSION)),
            })
    }
}
