//! External CQL engine
//!
//! The engine receives the flat argument list and answers with a single text
//! blob. [`ProcessEngine`] runs it as a subprocess, e.g.
//! `java -jar cql-ls-service.jar cql -fv=R4 ...`.

use crate::layout::to_uri;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::process::Command;

/// Environment variable holding the engine command line
pub const ENGINE_ENV_VAR: &str = "CQL_RUNNER_ENGINE";

/// Operation token requesting ELM output
pub const ELM_OPERATION: &str = "elm";

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Engine output is not valid UTF-8")]
    InvalidOutput,

    #[error("Invalid engine command line '{command_line}': {reason}")]
    CommandLine {
        command_line: String,
        reason: String,
    },
}

/// ELM serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElmFormat {
    #[default]
    Json,
    Xml,
}

impl ElmFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for ElmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElmFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(format!("Unsupported ELM format: {}", other)),
        }
    }
}

/// Trait for the engine evaluating CQL
#[async_trait]
pub trait CqlEngine: Send + Sync {
    /// Evaluate with the given argument list; `None` when the engine answered nothing
    async fn execute_cql(&self, args: &[String]) -> Result<Option<String>, EngineError>;

    /// Translate a CQL file to ELM
    async fn view_elm(&self, file: &Path, format: ElmFormat) -> Result<Option<String>, EngineError>;
}

/// Engine running as a subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEngine {
    program: String,
    leading_args: Vec<String>,
}

impl ProcessEngine {
    pub fn new<I, S>(program: impl Into<String>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a shell-style command line, e.g. `java -jar "/opt/My Tools/engine.jar"`
    ///
    /// Returns `Ok(None)` for a blank command line.
    pub fn from_command_line(command_line: &str) -> Result<Option<Self>, EngineError> {
        let mut parts = shell_words::split(command_line)
            .map_err(|e| EngineError::CommandLine {
                command_line: command_line.to_string(),
                reason: e.to_string(),
            })?
            .into_iter();
        Ok(parts.next().map(|program| Self::new(program, parts)))
    }

    /// Engine configured through `CQL_RUNNER_ENGINE`
    pub fn from_env() -> Result<Option<Self>, EngineError> {
        match std::env::var(ENGINE_ENV_VAR) {
            Ok(value) => Self::from_command_line(&value),
            Err(_) => Ok(None),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> Result<Option<String>, EngineError> {
        log::debug!(
            "Running engine: {} {:?} (+{} args)",
            self.program,
            self.leading_args,
            args.len()
        );

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| EngineError::InvalidOutput)?;
        let stdout = stdout.trim_end_matches(['\n', '\r']);
        Ok((!stdout.is_empty()).then(|| stdout.to_string()))
    }
}

#[async_trait]
impl CqlEngine for ProcessEngine {
    async fn execute_cql(&self, args: &[String]) -> Result<Option<String>, EngineError> {
        self.run(args).await
    }

    async fn view_elm(
        &self,
        file: &Path,
        format: ElmFormat,
    ) -> Result<Option<String>, EngineError> {
        let args = vec![
            ELM_OPERATION.to_string(),
            to_uri(file),
            format.as_str().to_string(),
        ];
        self.run(&args).await
    }
}
