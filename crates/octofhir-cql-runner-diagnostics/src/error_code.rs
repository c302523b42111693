//! Runner error codes following a structured numbering system
//!
//! Error code ranges:
//! - CQLR0001-CQLR0099: Filesystem and project layout errors
//! - CQLR0100-CQLR0199: Connection store errors
//! - CQLR0200-CQLR0299: Engine errors
//! - CQLR0300-CQLR0399: Configuration errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CQLR{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Filesystem errors (0001-0099)
    map.insert(2, ErrorInfo::new("CQL file not found")
        .with_help("Save the library before executing it"));
    map.insert(3, ErrorInfo::new("Output file could not be created"));
    map.insert(4, ErrorInfo::new("Transcript could not be written"));

    // Connection store errors (0100-0199)
    map.insert(100, ErrorInfo::new("Connection not found")
        .with_help("Add the connection before attaching contexts to it"));
    map.insert(101, ErrorInfo::new("Connection storage failed"));
    map.insert(102, ErrorInfo::new("Malformed connection state"));

    // Engine errors (0200-0299)
    map.insert(200, ErrorInfo::new("Engine invocation failed"));
    map.insert(201, ErrorInfo::new("Engine not configured")
        .with_help("Pass --engine or set CQL_RUNNER_ENGINE"));

    // Configuration errors (0300-0399)
    map.insert(301, ErrorInfo::new("Invalid test configuration")
        .with_help("input/tests/config.json must hold a testCasesToExclude array"));

    map
});

// Filesystem errors
pub const CQLR0002: ErrorCode = ErrorCode::new(2);
pub const CQLR0003: ErrorCode = ErrorCode::new(3);
pub const CQLR0004: ErrorCode = ErrorCode::new(4);

// Connection store errors
pub const CQLR0100: ErrorCode = ErrorCode::new(100);
pub const CQLR0101: ErrorCode = ErrorCode::new(101);
pub const CQLR0102: ErrorCode = ErrorCode::new(102);

// Engine errors
pub const CQLR0200: ErrorCode = ErrorCode::new(200);
pub const CQLR0201: ErrorCode = ErrorCode::new(201);

// Configuration errors
pub const CQLR0301: ErrorCode = ErrorCode::new(301);
