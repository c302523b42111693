//! Common test utilities
//!
//! Provides an IG-style project tree in a temporary directory and a stub
//! engine that records the arguments it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use octofhir_cql_runner::{CqlEngine, ElmFormat, EngineError};
use parking_lot::Mutex;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary project with `input/cql/<Library>.cql`
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// A project holding `Test.cql` declaring FHIR 4.0.1
    pub fn new() -> Self {
        let project = Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        };
        project.library(
            "Test",
            "library Test version '1.0.0'\nusing FHIR version '4.0.1'\n\ndefine \"Result\": true\n",
        );
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn cql_file(&self) -> PathBuf {
        self.path("input/cql/Test.cql")
    }

    pub fn library(&self, name: &str, source: &str) -> PathBuf {
        let file = self.path(&format!("input/cql/{}.cql", name));
        fs::create_dir_all(file.parent().expect("cql dir")).expect("create cql dir");
        fs::write(&file, source).expect("write library");
        file
    }

    /// Create `input/tests/<library>/<name>`
    pub fn test_case(&self, library: &str, name: &str) -> PathBuf {
        let dir = self.path(&format!("input/tests/{}/{}", library, name));
        fs::create_dir_all(&dir).expect("create test case");
        dir
    }

    pub fn terminology(&self) -> PathBuf {
        let dir = self.path("input/vocabulary/valueset");
        fs::create_dir_all(&dir).expect("create terminology dir");
        dir
    }

    pub fn options_file(&self) -> PathBuf {
        let file = self.path("input/cql/cql-options.json");
        fs::write(&file, "{}").expect("write options");
        file
    }

    /// Write `input/tests/config.json` with `(library, testCase, reason)` exclusions
    pub fn exclude(&self, exclusions: &[(&str, &str, &str)]) {
        let entries: Vec<_> = exclusions
            .iter()
            .map(|(library, test_case, reason)| {
                json!({ "library": library, "testCase": test_case, "reason": reason })
            })
            .collect();
        let file = self.path("input/tests/config.json");
        fs::create_dir_all(file.parent().expect("tests dir")).expect("create tests dir");
        fs::write(file, json!({ "testCasesToExclude": entries }).to_string())
            .expect("write test config");
    }
}

/// Engine answering a fixed result and recording every call
#[derive(Default)]
pub struct StubEngine {
    result: Option<String>,
    fail: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl StubEngine {
    pub fn answering(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl CqlEngine for StubEngine {
    async fn execute_cql(&self, args: &[String]) -> Result<Option<String>, EngineError> {
        self.calls.lock().push(args.to_vec());
        if self.fail {
            return Err(EngineError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "engine crashed".to_string(),
            });
        }
        Ok(self.result.clone())
    }

    async fn view_elm(
        &self,
        _file: &Path,
        format: ElmFormat,
    ) -> Result<Option<String>, EngineError> {
        Ok(Some(format!("<{}>", format)))
    }
}
