//! Project layout conventions
//!
//! ```text
//! <project>/input/cql/<Library>.cql
//! <project>/input/cql/cql-options.json
//! <project>/input/vocabulary/valueset
//! <project>/input/tests/<...>/<Library>/<test-case>/
//! <project>/input/tests/config.json
//! <project>/input/tests/results/<Library>.txt
//! ```

use octofhir_cql_runner_diagnostics::{CQLR0003, Result, RunnerError};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

pub const INPUT_DIR: &str = "input";
pub const CQL_DIR: &str = "cql";
pub const TESTS_DIR: &str = "tests";
pub const RESULTS_DIR: &str = "results";
pub const TEST_CONFIG_FILE: &str = "config.json";
pub const OPTIONS_FILE: &str = "cql-options.json";
pub const CQL_EXTENSION: &str = "cql";

/// Library name of a CQL file: the base name without `.cql`, truncated at the first `-`
pub fn library_name(file: &Path) -> String {
    let base = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let stem = base.strip_suffix(".cql").unwrap_or(base);
    stem.split('-').next().unwrap_or(stem).to_string()
}

/// Render a path as a `file://` URI
///
/// Relative paths are resolved against the current directory first. Paths that
/// cannot be expressed as a URI are rendered verbatim.
pub fn to_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .unwrap_or_else(|()| path.display().to_string())
}

/// Resolve a `file://` URI (or a bare path) back to a filesystem path
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => Some(PathBuf::from(uri)),
    }
}

/// Paths derived from one CQL file and its owning project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    project_root: PathBuf,
    library_dir: PathBuf,
    library_name: String,
}

impl ProjectLayout {
    /// Derive the layout for a CQL file
    ///
    /// Without an explicit root, the project root is the nearest ancestor of
    /// the library directory containing an `input` directory, falling back to
    /// the grandparent of the library directory.
    pub fn for_file(file: &Path, project_root: Option<&Path>) -> Self {
        let file = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        let library_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let project_root = match project_root {
            Some(root) => std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf()),
            None => find_project_root(&library_dir),
        };

        Self {
            project_root,
            library_dir,
            library_name: library_name(&file),
        }
    }

    /// Layout rooted at a project directory, for project-wide operations
    pub fn for_project(project_root: &Path) -> Self {
        let project_root =
            std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
        Self {
            library_dir: project_root.join(INPUT_DIR).join(CQL_DIR),
            project_root,
            library_name: String::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    /// `<project>/input/cql`
    pub fn cql_dir(&self) -> PathBuf {
        self.project_root.join(INPUT_DIR).join(CQL_DIR)
    }

    /// `<project>/input/vocabulary/valueset`
    pub fn terminology_dir(&self) -> PathBuf {
        self.project_root
            .join(INPUT_DIR)
            .join("vocabulary")
            .join("valueset")
    }

    /// `<library-dir>/cql-options.json`
    pub fn options_path(&self) -> PathBuf {
        self.library_dir.join(OPTIONS_FILE)
    }

    /// `<project>/input/tests`
    pub fn test_root(&self) -> PathBuf {
        self.project_root.join(INPUT_DIR).join(TESTS_DIR)
    }

    /// `<project>/input/tests/config.json`
    pub fn test_config_path(&self) -> PathBuf {
        self.test_root().join(TEST_CONFIG_FILE)
    }

    /// `<project>/input/tests/results`
    pub fn results_dir(&self) -> PathBuf {
        self.test_root().join(RESULTS_DIR)
    }

    /// `<project>/input/tests/results/<Library>.txt`
    pub fn output_path(&self) -> PathBuf {
        self.results_dir().join(format!("{}.txt", self.library_name))
    }

    /// Create the output file (and its directories) if missing
    pub fn ensure_output_file(&self) -> Result<PathBuf> {
        let output_path = self.output_path();
        let results_dir = self.results_dir();

        fs::create_dir_all(&results_dir).map_err(|e| {
            RunnerError::io(CQLR0003, "Failed to create results directory", &results_dir, e)
        })?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&output_path)
            .map_err(|e| {
                RunnerError::io(CQLR0003, "Failed to create output file", &output_path, e)
            })?;

        Ok(output_path)
    }
}

fn find_project_root(library_dir: &Path) -> PathBuf {
    library_dir
        .ancestors()
        .find(|dir| dir.join(INPUT_DIR).is_dir())
        .or_else(|| library_dir.parent().and_then(Path::parent))
        .unwrap_or(library_dir)
        .to_path_buf()
}

/// All CQL files below a directory, sorted by path
pub fn discover_libraries(cql_dir: &Path) -> Vec<PathBuf> {
    if !cql_dir.is_dir() {
        log::warn!("unable to find libraries @ {}", cql_dir.display());
        return Vec::new();
    }

    let mut libraries: Vec<PathBuf> = WalkDir::new(cql_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(CQL_EXTENSION))
        .collect();
    libraries.sort();
    libraries
}
