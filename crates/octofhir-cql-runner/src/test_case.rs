//! Test case discovery
//!
//! Test data for a library lives in directories named after the library,
//! anywhere below the test root. Every immediate child directory of such a
//! directory is one test case, typically named after the patient it holds.

use indexmap::IndexMap;
use octofhir_cql_runner_diagnostics::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name prefix of the measure report carrying a test case description
pub const MEASURE_REPORT_PREFIX: &str = "MeasureReport";

/// Extension URL of the test case description on a measure report
pub const TEST_CASE_DESCRIPTION_URL: &str =
    "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-testCaseDescription";

/// One executable data set for a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
}

/// Outcome of test case discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestData {
    /// No test root, or no directory named after the library
    Missing,
    /// Library data directories exist; the list may still be empty
    Found(Vec<TestCase>),
}

impl TestData {
    pub fn test_cases(&self) -> &[TestCase] {
        match self {
            Self::Missing => &[],
            Self::Found(cases) => cases,
        }
    }

    pub fn into_test_cases(self) -> Vec<TestCase> {
        match self {
            Self::Missing => Vec::new(),
            Self::Found(cases) => cases,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// A test case excluded from execution for one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseExclusion {
    pub library: String,
    pub test_case: String,
    pub reason: String,
}

/// Project test configuration (`input/tests/config.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    #[serde(default)]
    pub test_cases_to_exclude: Vec<TestCaseExclusion>,
}

impl TestConfig {
    /// Load the test configuration; a missing or invalid file yields the default
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::debug!("No test configuration at {}", path.display());
                Self::default()
            }
            Err(e) => {
                log::error!("{}", e);
                Self::default()
            }
        }
    }

    /// Read and parse the test configuration; `None` when the file does not exist
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(path).map_err(|e| RunnerError::test_config(path, e))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| RunnerError::test_config(path, e))
    }

    /// Excluded test cases of one library, mapped to the exclusion reason
    pub fn exclusions_for(&self, library: &str) -> IndexMap<String, String> {
        self.test_cases_to_exclude
            .iter()
            .filter(|exclusion| exclusion.library == library)
            .map(|exclusion| (exclusion.test_case.clone(), exclusion.reason.clone()))
            .collect()
    }
}

/// Discover the test cases of a library below `root`
///
/// Directories are visited in file name order. Children listed in `excluded`
/// are skipped.
pub fn discover_test_cases(root: &Path, library: &str, excluded: &[String]) -> TestData {
    if !root.is_dir() {
        return TestData::Missing;
    }

    let library_dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable test path: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir() && entry.file_name() == library)
        .map(|entry| entry.into_path())
        .collect();

    if library_dirs.is_empty() {
        return TestData::Missing;
    }

    let mut test_cases = Vec::new();
    for dir in &library_dirs {
        for (name, path) in child_directories(dir) {
            if excluded.iter().any(|e| *e == name) {
                log::debug!("Excluding test case {} of {}", name, library);
                continue;
            }
            let description = measure_report_description(&path);
            test_cases.push(TestCase {
                name,
                path,
                description,
            });
        }
    }

    TestData::Found(test_cases)
}

fn child_directories(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to read test directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut children: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .collect();
    children.sort();
    children
}

/// Description of a test case from its measure report, if any
pub fn measure_report_description(test_case_dir: &Path) -> Option<String> {
    let mut reports: Vec<PathBuf> = fs::read_dir(test_case_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(MEASURE_REPORT_PREFIX))
        })
        .map(|entry| entry.path())
        .collect();
    reports.sort();
    let report_path = reports.into_iter().next()?;

    let content = fs::read_to_string(&report_path).ok()?;
    let report: Value = match serde_json::from_str(&content) {
        Ok(report) => report,
        Err(e) => {
            log::debug!("Unreadable measure report {}: {}", report_path.display(), e);
            return None;
        }
    };

    report
        .get("extension")?
        .as_array()?
        .iter()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(TEST_CASE_DESCRIPTION_URL))?
        .get("valueMarkdown")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(data: &TestData) -> Vec<&str> {
        data.test_cases().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data = discover_test_cases(&temp_dir.path().join("tests"), "Test", &[]);
        assert!(data.is_missing());
    }

    #[test]
    fn test_no_library_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("Other/case-1")).unwrap();
        assert_eq!(discover_test_cases(temp_dir.path(), "Test", &[]), TestData::Missing);
    }

    #[test]
    fn test_found_but_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("Test")).unwrap();
        fs::write(temp_dir.path().join("Test/readme.txt"), "not a case").unwrap();
        assert_eq!(discover_test_cases(temp_dir.path(), "Test", &[]), TestData::Found(vec![]));
    }

    #[test]
    fn test_nested_library_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Test/patient-b")).unwrap();
        fs::create_dir_all(root.join("Test/patient-a")).unwrap();
        fs::create_dir_all(root.join("v2/Test/patient-c")).unwrap();
        fs::create_dir_all(root.join("TestOther/patient-x")).unwrap();

        let data = discover_test_cases(root, "Test", &[]);
        assert_eq!(names(&data), vec!["patient-a", "patient-b", "patient-c"]);
        assert_eq!(data.test_cases()[2].path, root.join("v2/Test/patient-c"));
    }

    #[test]
    fn test_exclusions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Test/keep")).unwrap();
        fs::create_dir_all(root.join("Test/skip")).unwrap();

        let data = discover_test_cases(root, "Test", &["skip".to_string(), "other".to_string()]);
        assert_eq!(names(&data), vec!["keep"]);
    }

    #[test]
    fn test_measure_report_description() {
        let temp_dir = tempfile::tempdir().unwrap();
        let case_dir = temp_dir.path().join("Test/denominator-1");
        fs::create_dir_all(&case_dir).unwrap();
        fs::write(
            case_dir.join("MeasureReport-denominator-1.json"),
            json!({
                "resourceType": "MeasureReport",
                "extension": [
                    { "url": "http://example.org/other", "valueString": "ignored" },
                    { "url": TEST_CASE_DESCRIPTION_URL, "valueMarkdown": "Patient in denominator" }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let data = discover_test_cases(temp_dir.path(), "Test", &[]);
        assert_eq!(
            data.test_cases()[0].description.as_deref(),
            Some("Patient in denominator")
        );
    }

    #[test]
    fn test_measure_report_description_failures() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        assert_eq!(measure_report_description(&dir.join("missing")), None);
        assert_eq!(measure_report_description(dir), None);

        fs::write(dir.join("MeasureReport.json"), "{ not json").unwrap();
        assert_eq!(measure_report_description(dir), None);

        fs::write(dir.join("MeasureReport.json"), json!({ "extension": [] }).to_string()).unwrap();
        assert_eq!(measure_report_description(dir), None);
    }

    #[test]
    fn test_config_exclusions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            json!({
                "testCasesToExclude": [
                    { "library": "Test", "testCase": "skip", "reason": "bad data" },
                    { "library": "Other", "testCase": "keep", "reason": "other library" }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let config = TestConfig::load(&path);
        let exclusions = config.exclusions_for("Test");
        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions.get("skip").map(String::as_str), Some("bad data"));
        assert!(config.exclusions_for("Missing").is_empty());
    }

    #[test]
    fn test_config_invalid_or_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        assert_eq!(TestConfig::load(&path), TestConfig::default());

        fs::write(&path, "[]").unwrap();
        assert_eq!(TestConfig::load(&path), TestConfig::default());
    }

    #[test]
    fn test_config_parse_failure_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        assert_eq!(TestConfig::try_load(&path).unwrap(), None);

        fs::write(&path, "{ not json").unwrap();
        let err = TestConfig::try_load(&path).unwrap_err();
        assert_eq!(err.code(), octofhir_cql_runner_diagnostics::CQLR0301);
        assert!(err.to_string().contains("config.json"));
    }
}
