//! Engine dispatch and transcript rendering
//!
//! The dispatcher scans the built argument list for diagnostic fragments,
//! hands the list to the engine, and renders a transcript:
//!
//! ```text
//! CQL: file:///project/input/cql
//! Terminology: file:///project/input/vocabulary/valueset
//! Test cases:
//! file:///project/input/tests/Test/patient-1 - patient-1
//!
//! patient-1:
//! InPopulation=true
//!
//! elapsed: 1.234 seconds
//! ```
//!
//! Nothing in here fails on anomalies. Missing terminology, missing test data,
//! engine failures and unexpected result shapes all degrade to transcript text.
//! The only error is failing to append the transcript to the output file.

use crate::args::{Arg, ArgList, Flag};
use crate::engine::CqlEngine;
use crate::layout::{to_uri, uri_to_path};
use crate::notify::Notifier;
use crate::params::{EvaluationParameters, NO_LIBRARY_CONTENT};
use indexmap::IndexMap;
use octofhir_cql_runner_diagnostics::{CQLR0004, Notice, Result, RunnerError};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Diagnostic lines derived from an argument list before execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSummary {
    /// `CQL: <library-dir>`
    pub cql_message: Option<String>,
    /// Terminology location, or a warning when it does not exist
    pub terminology_message: Option<String>,
    /// `Test cases:` listing, or a single "No data found" line
    pub test_messages: Vec<String>,
    /// Context values in argument order
    pub context_values: Vec<String>,
    pub expression: Option<String>,
}

impl ArgumentSummary {
    pub fn has_test_data(&self) -> bool {
        !self.context_values.is_empty()
    }

    /// All summary lines in transcript order
    pub fn lines(&self) -> Vec<String> {
        self.cql_message
            .iter()
            .chain(self.terminology_message.iter())
            .chain(self.test_messages.iter())
            .cloned()
            .collect()
    }
}

/// Scan an argument list for the pieces shown ahead of the result
///
/// The terminology location is checked for existence here, at render time.
pub fn describe_arguments(args: &ArgList, test_path: Option<&Path>) -> ArgumentSummary {
    let mut summary = ArgumentSummary::default();
    let mut test_cases = Vec::new();
    let mut pending_model: Option<&str> = None;

    for arg in args.iter() {
        let Arg::Flag(flag, value) = arg else {
            continue;
        };
        match flag {
            Flag::LibraryUrl => summary.cql_message = Some(format!("CQL: {}", value)),
            Flag::Terminology => {
                let exists = uri_to_path(value).is_some_and(|path| path.exists());
                summary.terminology_message = Some(if exists {
                    format!("Terminology: {}", value)
                } else {
                    format!(
                        "No terminology found at {}. Evaluation may fail if terminology is required.",
                        value
                    )
                });
            }
            Flag::ModelUrl => pending_model = Some(value),
            Flag::ContextValue => {
                test_cases.push(match pending_model.take() {
                    Some(model) => format!("{} - {}", model, value),
                    None => value.to_string(),
                });
                summary.context_values.push(value.to_string());
            }
            Flag::Expression if summary.expression.is_none() => {
                summary.expression = Some(value.to_string());
            }
            _ => {}
        }
    }

    summary.test_messages = if test_cases.is_empty() {
        vec![format!(
            "No data found at path {}. Evaluation may fail if data is required.",
            test_path.map(to_uri).unwrap_or_default()
        )]
    } else {
        std::iter::once("Test cases:".to_string())
            .chain(test_cases)
            .collect()
    };

    summary
}

/// Pair each context value with its line of the engine result
///
/// The engine answers one `<expression>=<value>` line per context, separated
/// by blank lines. Each line is emitted below its context value, blocks
/// separated by a blank line. When the result does not have that shape, or no
/// expression was evaluated, the result is returned unchanged.
pub fn attempt_interleave(
    expression: Option<&str>,
    context_values: &[String],
    result: &str,
) -> String {
    let Some(expression) = expression.filter(|e| !e.is_empty()) else {
        return result.to_string();
    };
    if context_values.is_empty() {
        return result.to_string();
    }

    let lines: Vec<&str> = result.split('\n').collect();
    if lines.len() < context_values.len() {
        return result.to_string();
    }

    let mut blocks = Vec::with_capacity(context_values.len());
    for (i, value) in context_values.iter().enumerate() {
        match lines.get(i * 2) {
            Some(line) if line.starts_with(expression) => {
                blocks.push(format!("{}:\n{}", value, line));
            }
            line => {
                log::debug!("Not interleaving: line {} is {:?}", i * 2, line);
                return result.to_string();
            }
        }
    }

    blocks.join("\n\n")
}

/// Rendered outcome of one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub lines: Vec<String>,
    /// Time spent in the engine call
    pub elapsed: Duration,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn append_to(&self, path: &Path) -> Result<()> {
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            for line in &self.lines {
                writeln!(file, "{}", line)?;
            }
            file.flush()
        };
        write().map_err(|e| RunnerError::io(CQLR0004, "Failed to write transcript", path, e))
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Elapsed seconds at millisecond resolution
fn elapsed_line(elapsed: Duration) -> String {
    format!("elapsed: {} seconds", elapsed.as_millis() as f64 / 1000.0)
}

/// Runs evaluations against an engine and records their transcripts
pub struct Dispatcher<'a> {
    engine: &'a dyn CqlEngine,
    notifier: &'a dyn Notifier,
}

impl<'a> Dispatcher<'a> {
    pub fn new(engine: &'a dyn CqlEngine, notifier: &'a dyn Notifier) -> Self {
        Self { engine, notifier }
    }

    /// Execute one evaluation and append its transcript to the output file
    ///
    /// Parameters built for a missing file produce an empty transcript.
    pub async fn execute(&self, params: &EvaluationParameters) -> Result<Transcript> {
        let (Some(args), Some(output_path)) = (&params.operation_args, &params.output_path) else {
            self.notifier.notify(Notice::info(NO_LIBRARY_CONTENT));
            return Ok(Transcript::default());
        };

        let summary = describe_arguments(args, params.test_path.as_deref());
        let mut transcript = Transcript::default();
        for line in summary.lines() {
            transcript.push(line);
        }

        if !params.excluded.is_empty() {
            transcript.push("");
            transcript.push("Excluded test cases:");
            for line in excluded_lines(&params.excluded) {
                transcript.push(line);
            }
        }
        transcript.push("");

        let start = Instant::now();
        let result = self.engine.execute_cql(args.tokens()).await;
        transcript.elapsed = start.elapsed();

        let result = match result {
            Ok(result) => result.unwrap_or_default(),
            Err(e) => {
                log::error!("CQL engine failed: {}", e);
                self.notifier
                    .notify(Notice::error(format!("CQL engine failed: {}", e)));
                String::new()
            }
        };

        transcript.push(attempt_interleave(
            summary.expression.as_deref(),
            &summary.context_values,
            &result,
        ));
        transcript.push(elapsed_line(transcript.elapsed));

        transcript.append_to(output_path)?;
        log::info!(
            "Wrote {} transcript line(s) to {}",
            transcript.lines.len(),
            output_path.display()
        );

        Ok(transcript)
    }
}

fn excluded_lines(excluded: &IndexMap<String, String>) -> impl Iterator<Item = String> + '_ {
    excluded
        .iter()
        .map(|(test_case, reason)| format!("{} - {}", test_case, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn values(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_interleave_per_context() {
        let result = "Result=Result1\n\nResult=Result2\n\nResult=Result3";
        let contexts = values(&["Patient-1", "Patient-2", "Patient-3"]);

        assert_eq!(
            attempt_interleave(Some("Result"), &contexts, result),
            "Patient-1:\nResult=Result1\n\nPatient-2:\nResult=Result2\n\nPatient-3:\nResult=Result3"
        );
    }

    #[test]
    fn test_interleave_without_expression() {
        let result = "Result=1";
        assert_eq!(attempt_interleave(None, &values(&["a"]), result), result);
        assert_eq!(attempt_interleave(Some(""), &values(&["a"]), result), result);
        assert_eq!(attempt_interleave(Some("Result"), &[], result), result);
    }

    #[test]
    fn test_interleave_mismatch() {
        let contexts = values(&["a", "b"]);
        assert_eq!(attempt_interleave(Some("Result"), &contexts, "Result=1"), "Result=1");

        let shifted = "Result=1\nResult=2\n";
        assert_eq!(attempt_interleave(Some("Result"), &contexts, shifted), shifted);
    }

    #[test]
    fn test_describe_arguments() {
        let temp_dir = tempfile::tempdir().unwrap();
        let terminology = to_uri(temp_dir.path());
        let args = ArgList::from_tokens([
            "cql".to_string(),
            "-fv=R4".to_string(),
            "-ln=Test".to_string(),
            "-lu=file:///p/input/cql".to_string(),
            "-e=Result".to_string(),
            format!("-t={}", terminology),
            "-m=FHIR".to_string(),
            "-mu=file:///p/input/tests/Test/a".to_string(),
            "-c=Patient".to_string(),
            "-cv=a".to_string(),
        ]);

        let summary = describe_arguments(&args, None);
        assert_eq!(summary.cql_message.as_deref(), Some("CQL: file:///p/input/cql"));
        assert_eq!(
            summary.terminology_message,
            Some(format!("Terminology: {}", terminology))
        );
        assert_eq!(
            summary.test_messages,
            vec!["Test cases:", "file:///p/input/tests/Test/a - a"]
        );
        assert_eq!(summary.context_values, vec!["a"]);
        assert_eq!(summary.expression.as_deref(), Some("Result"));
    }

    #[test]
    fn test_describe_arguments_without_data() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("vocabulary");
        let args = ArgList::from_tokens([
            "cql".to_string(),
            format!("-t={}", to_uri(&missing)),
        ]);

        let summary = describe_arguments(&args, Some(temp_dir.path()));
        assert!(!summary.has_test_data());
        assert!(
            summary
                .terminology_message
                .unwrap()
                .starts_with("No terminology found at ")
        );
        assert_eq!(
            summary.test_messages,
            vec![format!(
                "No data found at path {}. Evaluation may fail if data is required.",
                to_uri(temp_dir.path())
            )]
        );
    }

    #[test]
    fn test_elapsed_line() {
        assert_eq!(elapsed_line(Duration::from_millis(3450)), "elapsed: 3.45 seconds");
        assert_eq!(elapsed_line(Duration::ZERO), "elapsed: 0 seconds");
    }

    proptest! {
        #[test]
        fn interleave_returns_unprefixed_results_unchanged(
            contexts in prop::collection::vec("[a-z0-9-]{1,12}", 1..6),
            lines in prop::collection::vec("[a-z =0-9]{0,16}", 0..12),
        ) {
            let result = lines.join("\n");
            prop_assert_eq!(attempt_interleave(Some("Result"), &contexts, &result), result);
        }

        #[test]
        fn interleave_returns_short_results_unchanged(
            contexts in prop::collection::vec("[a-z0-9-]{1,12}", 2..8),
        ) {
            let result = (1..contexts.len())
                .map(|i| format!("Result={}", i))
                .collect::<Vec<_>>()
                .join("\n");
            prop_assert_eq!(attempt_interleave(Some("Result"), &contexts, &result), result);
        }
    }
}
