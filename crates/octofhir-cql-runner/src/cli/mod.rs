//! CLI functionality for the CQL runner
//!
//! This module contains all CLI-related functionality including:
//! - Evaluation of one library or a whole project
//! - Connection and context management
//! - ELM viewing
//! - Output formatting

pub mod connections;
pub mod elm;
pub mod execute;
pub mod output;

use crate::connection::{ConnectionStore, JsonFileStorage};
use crate::engine::ProcessEngine;
use crate::layout::ProjectLayout;
use anyhow::{Context, Result};
use octofhir_cql_runner_diagnostics::RunnerError;
use std::path::{Path, PathBuf};

/// Connection state location relative to the project root
pub const STATE_FILE: &str = ".cql-runner/state.json";

/// Environment variable overriding the connection state location
pub const STATE_ENV_VAR: &str = "CQL_RUNNER_STATE";

/// Settings shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    /// Explicit connection state file
    pub state: Option<PathBuf>,
    /// Engine command line, e.g. `java -jar cql-ls-service.jar`
    pub engine: Option<String>,
    /// Explicit project root
    pub project: Option<PathBuf>,
    pub verbose: bool,
}

impl GlobalConfig {
    /// Project root used for state lookup: the explicit root or the current directory
    pub fn project_root(&self) -> PathBuf {
        self.project.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Settings for a command working on one CQL file
    ///
    /// Without an explicit root, the project is the one owning the file, so the
    /// connection state is read from that project.
    pub fn for_file(&self, file: &Path) -> Self {
        let layout = ProjectLayout::for_file(file, self.project.as_deref());
        Self {
            project: Some(layout.project_root().to_path_buf()),
            ..self.clone()
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| self.project_root().join(STATE_FILE))
    }

    pub fn storage(&self) -> JsonFileStorage {
        JsonFileStorage::new(self.state_path())
    }

    /// Load the connection store; the local connection is selected when nothing is current
    pub fn load_store(&self) -> Result<(ConnectionStore, JsonFileStorage)> {
        let storage = self.storage();
        let mut store = ConnectionStore::load(&storage).with_context(|| {
            format!("Failed to load connections from {}", storage.path().display())
        })?;

        if store.current_connection().is_none() && store.all_connections().is_empty() {
            store = ConnectionStore::with_local("");
        }
        Ok((store, storage))
    }

    /// The configured engine
    pub fn engine(&self) -> Result<ProcessEngine> {
        let explicit = match self.engine.as_deref() {
            Some(command_line) => ProcessEngine::from_command_line(command_line)?,
            None => None,
        };
        let engine = match explicit {
            Some(engine) => Some(engine),
            None => ProcessEngine::from_env()?,
        };
        engine.ok_or_else(|| RunnerError::engine_not_configured().into())
    }
}
