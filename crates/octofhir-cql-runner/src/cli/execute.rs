//! Execute command implementation

use super::GlobalConfig;
use super::output::{self, ConsoleNotifier};
use crate::connection::ConnectionStore;
use crate::dispatcher::Dispatcher;
use crate::engine::CqlEngine;
use crate::layout::{ProjectLayout, discover_libraries};
use crate::notify::Notifier;
use crate::params::{EvaluationParameters, ParameterBuilder};
use crate::test_case::{TestConfig, discover_test_cases};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Configuration for the execute command
#[derive(Debug, Clone, Default)]
pub struct ExecuteConfig {
    pub file: PathBuf,
    /// Expression to evaluate; the whole library when absent
    pub expression: Option<String>,
    /// Only run these locally discovered test cases
    pub test_cases: Vec<String>,
    pub measurement_period: Option<String>,
}

fn build_parameters(
    global: &GlobalConfig,
    store: &ConnectionStore,
    notifier: &dyn Notifier,
    config: &ExecuteConfig,
) -> Result<EvaluationParameters> {
    let mut builder = ParameterBuilder::new(store, notifier).test_cases(config.test_cases.clone());
    if let Some(root) = &global.project {
        builder = builder.project_root(root);
    }
    if let Some(period) = &config.measurement_period {
        builder = builder.measurement_period(period);
    }

    builder
        .build(&config.file, config.expression.as_deref())
        .with_context(|| format!("Failed to build parameters for {}", config.file.display()))
}

async fn run(
    engine: &dyn CqlEngine,
    notifier: &dyn Notifier,
    params: &EvaluationParameters,
    file: &Path,
) -> Result<()> {
    let transcript = Dispatcher::new(engine, notifier)
        .execute(params)
        .await
        .with_context(|| format!("Failed to execute {}", file.display()))?;

    if transcript.is_empty() {
        return Ok(());
    }
    print!("{}", transcript);
    if let Some(output_path) = &params.output_path {
        eprintln!(
            "{}",
            output::format_success(&format!("Results appended to {}", output_path.display()))
        );
    }
    Ok(())
}

/// Evaluate one library
pub async fn execute(global: &GlobalConfig, config: ExecuteConfig) -> Result<()> {
    let global = &global.for_file(&config.file);
    if global.verbose {
        eprintln!("Executing CQL file: {}", config.file.display());
    }

    let (store, _) = global.load_store()?;
    let engine = global.engine()?;
    let notifier = ConsoleNotifier;

    let params = build_parameters(global, &store, &notifier, &config)?;
    run(&engine, &notifier, &params, &config.file).await
}

/// Evaluate every library under `input/cql`, one after another
pub async fn execute_all(global: &GlobalConfig, expression: Option<String>) -> Result<()> {
    let layout = ProjectLayout::for_project(&global.project_root());
    let libraries = discover_libraries(&layout.cql_dir());
    if libraries.is_empty() {
        eprintln!(
            "{}",
            output::format_warning(&format!("No libraries found in {}", layout.cql_dir().display()))
        );
        return Ok(());
    }

    let global = GlobalConfig {
        project: Some(layout.project_root().to_path_buf()),
        ..global.clone()
    };
    let (store, _) = global.load_store()?;
    let engine = global.engine()?;
    let notifier = ConsoleNotifier;

    for file in libraries {
        let config = ExecuteConfig {
            file,
            expression: expression.clone(),
            ..Default::default()
        };
        let params = build_parameters(&global, &store, &notifier, &config)?;
        run(&engine, &notifier, &params, &config.file).await?;
    }
    Ok(())
}

/// Print the engine argument list without executing it
pub fn print_args(global: &GlobalConfig, config: ExecuteConfig) -> Result<()> {
    let global = &global.for_file(&config.file);
    let (store, _) = global.load_store()?;
    let params = build_parameters(global, &store, &ConsoleNotifier, &config)?;

    if let Some(args) = params.operation_args {
        let content = args.tokens().join("\n");
        output::write_output(&content, None)?;
    }
    Ok(())
}

/// List the test cases of a library, with the ones excluded by the test configuration
pub fn list_test_cases(global: &GlobalConfig, file: &Path) -> Result<()> {
    let layout = ProjectLayout::for_file(file, global.project.as_deref());
    let excluded =
        TestConfig::load(&layout.test_config_path()).exclusions_for(layout.library_name());
    let excluded_names: Vec<String> = excluded.keys().cloned().collect();

    let test_data =
        discover_test_cases(&layout.test_root(), layout.library_name(), &excluded_names);
    if test_data.is_missing() {
        eprintln!(
            "{}",
            output::format_warning(&format!(
                "No test data for {} in {}",
                layout.library_name(),
                layout.test_root().display()
            ))
        );
        return Ok(());
    }

    println!("{}", output::format_test_cases(test_data.test_cases()));
    if !excluded.is_empty() {
        println!("{}", output::format_exclusions(&excluded));
    }
    Ok(())
}
