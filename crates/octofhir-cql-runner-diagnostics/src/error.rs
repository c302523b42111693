//! Runner error types

use crate::{CQLR0002, CQLR0100, CQLR0200, CQLR0201, CQLR0301, ErrorCode};
use std::path::{Path, PathBuf};
use std::fmt;
use thiserror::Error;

/// Main CQL runner error type
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Filesystem error tied to a path
    #[error("{code}: {message}: {}", path.display())]
    Io {
        code: ErrorCode,
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Something addressed by name does not exist
    #[error("{code}: {message}")]
    NotFound { code: ErrorCode, message: String },

    /// Persisted state could not be read or written
    #[error("{code}: {message}")]
    Storage {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// The external engine could not be used
    #[error("{code}: {message}")]
    Engine { code: ErrorCode, message: String },

    /// Invalid configuration
    #[error("{code}: {message}")]
    Config { code: ErrorCode, message: String },
}

impl RunnerError {
    /// Create an I/O error for a path
    pub fn io(
        code: ErrorCode,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            code,
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    /// A CQL file that does not exist (CQLR0002)
    pub fn file_not_found(path: &Path) -> Self {
        Self::NotFound {
            code: CQLR0002,
            message: format!("CQL file not found: {}", path.display()),
        }
    }

    /// Create a connection-not-found error (CQLR0100)
    pub fn connection_not_found(name: &str) -> Self {
        Self::NotFound {
            code: CQLR0100,
            message: format!("Connection '{}' does not exist", name),
        }
    }

    /// Create a storage error
    pub fn storage(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Create an engine invocation error (CQLR0200)
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            code: CQLR0200,
            message: message.into(),
        }
    }

    /// No engine command was configured (CQLR0201)
    pub fn engine_not_configured() -> Self {
        Self::Engine {
            code: CQLR0201,
            message: "No CQL engine command configured".to_string(),
        }
    }

    /// The test configuration could not be read or parsed (CQLR0301)
    pub fn test_config(path: &Path, reason: impl fmt::Display) -> Self {
        Self::Config {
            code: CQLR0301,
            message: format!("Invalid test configuration {}: {}", path.display(), reason),
        }
    }

    /// Attach context to a storage error; other variants are returned unchanged
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        match self {
            Self::Storage { code, message, .. } => Self::Storage {
                code,
                message,
                context: Some(ctx.into()),
            },
            other => other,
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Storage { code, .. } => *code,
            Self::Engine { code, .. } => *code,
            Self::Config { code, .. } => *code,
        }
    }

    /// Help text registered for the error code, if any
    pub fn help(&self) -> Option<&'static str> {
        self.code().info().help
    }
}
