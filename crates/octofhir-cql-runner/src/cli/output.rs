//! Output formatting utilities

use crate::connection::{Connection, ConnectionStore};
use crate::notify::Notifier;
use crate::test_case::TestCase;
use anyhow::{Context, Result};
use colored::Colorize;
use indexmap::IndexMap;
use octofhir_cql_runner_diagnostics::Notice;
use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(std::io::stdout().is_terminal()),
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a warning for display
pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Prints notices to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}", notice.colored());
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

#[derive(Tabled)]
struct TestCaseRow {
    #[tabled(rename = "Test case")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Path")]
    path: String,
}

/// Table of discovered test cases
pub fn format_test_cases(test_cases: &[TestCase]) -> String {
    if test_cases.is_empty() {
        return "(no test cases)".to_string();
    }

    let rows = test_cases.iter().map(|case| TestCaseRow {
        name: case.name.clone(),
        description: case.description.clone().unwrap_or_default(),
        path: case.path.display().to_string(),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

#[derive(Tabled)]
struct ExclusionRow {
    #[tabled(rename = "Excluded")]
    test_case: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Table of excluded test cases and their reasons
pub fn format_exclusions(excluded: &IndexMap<String, String>) -> String {
    let rows = excluded.iter().map(|(test_case, reason)| ExclusionRow {
        test_case: test_case.clone(),
        reason: reason.clone(),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

#[derive(Tabled)]
struct ConnectionRow {
    #[tabled(rename = "")]
    current: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Contexts")]
    contexts: String,
}

fn context_summary(connection: &Connection) -> String {
    connection
        .contexts
        .iter()
        .map(|(key, context)| match &context.resource_display {
            Some(display) => format!("{} ({})", key, display),
            None => key.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Table of all connections, marking the current one
pub fn format_connections(store: &ConnectionStore) -> String {
    if store.all_connections().is_empty() {
        return "(no connections)".to_string();
    }

    let current = store.current_connection().map(|c| c.name.as_str());
    let rows = store.all_connections().values().map(|connection| ConnectionRow {
        current: if current == Some(connection.name.as_str()) { "*" } else { "" },
        name: connection.name.clone(),
        endpoint: connection.endpoint.clone(),
        contexts: context_summary(connection),
    });
    Table::new(rows).with(Style::modern()).to_string()
}
