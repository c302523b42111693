//! ELM command implementation

use super::GlobalConfig;
use super::output;
use crate::engine::{CqlEngine, ElmFormat};
use anyhow::Result;
use octofhir_cql_runner_diagnostics::RunnerError;
use std::path::PathBuf;

/// Configuration for the ELM command
pub struct ElmConfig {
    pub file: PathBuf,
    pub format: ElmFormat,
    /// Output file (default: stdout)
    pub output_file: Option<PathBuf>,
}

/// Ask the engine to translate a library to ELM
pub async fn view_elm(global: &GlobalConfig, config: ElmConfig) -> Result<()> {
    if !config.file.is_file() {
        return Err(RunnerError::file_not_found(&config.file).into());
    }

    let engine = global.engine()?;
    let elm = engine
        .view_elm(&config.file, config.format)
        .await
        .map_err(|e| {
            RunnerError::engine(format!("Failed to translate {}: {}", config.file.display(), e))
        })?;

    match elm {
        Some(elm) => output::write_output(&elm, config.output_file.as_deref()),
        None => {
            eprintln!("{}", output::format_warning("The engine returned no ELM"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cql_runner_diagnostics::CQLR0002;

    #[tokio::test]
    async fn test_missing_file_is_reported_before_the_engine() {
        let config = ElmConfig {
            file: PathBuf::from("/does/not/exist/Test.cql"),
            format: ElmFormat::Json,
            output_file: None,
        };

        let error = view_elm(&GlobalConfig::default(), config).await.unwrap_err();
        let error = error.downcast::<RunnerError>().unwrap();
        assert_eq!(error.code(), CQLR0002);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_failure_carries_engine_code() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("Test.cql");
        std::fs::write(&file, "library Test\n").unwrap();
        let global = GlobalConfig {
            engine: Some("false".to_string()),
            ..Default::default()
        };
        let config = ElmConfig {
            file,
            format: ElmFormat::Xml,
            output_file: None,
        };

        let error = view_elm(&global, config).await.unwrap_err();
        let error = error.downcast::<RunnerError>().unwrap();
        assert_eq!(error.code(), octofhir_cql_runner_diagnostics::CQLR0200);
    }
}
