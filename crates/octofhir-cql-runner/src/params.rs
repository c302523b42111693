//! Evaluation parameter building
//!
//! Maps a CQL file, an optional expression and the current connection to the
//! engine argument list:
//!
//! ```text
//! cql -fv=<version> [-op=<options>]
//!     ( -ln=<library> -lu=<library-dir> [-e=<expression>] [-t=<terminology>]
//!       [-m=FHIR -mu=<model-data>] [-p=<library>."Measurement Period" -pv=<period>]
//!       -c=<context-type> -cv=<context-value> )*
//! ```
//!
//! The parenthesized block repeats once per evaluated context. With the local
//! connection (or a connection without contexts) the contexts come from test
//! case discovery and each test case directory is its own model data location.
//! A remote connection shares its endpoint across all of its contexts. When
//! no context is found the block is emitted once, without model and context
//! flags.

use crate::args::{ArgList, Flag};
use crate::connection::ConnectionStore;
use crate::fhir_version::FhirVersion;
use crate::layout::{ProjectLayout, to_uri};
use crate::notify::Notifier;
use crate::test_case::{TestConfig, discover_test_cases};
use indexmap::IndexMap;
use octofhir_cql_runner_diagnostics::{Notice, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Leading operation token for CQL evaluation
pub const CQL_OPERATION: &str = "cql";

/// Data model passed with every model data location
pub const MODEL_TYPE: &str = "FHIR";

/// Context type used for discovered test cases
pub const PATIENT_CONTEXT: &str = "Patient";

/// Name of the measurement period parameter
pub const MEASUREMENT_PERIOD: &str = "Measurement Period";

pub const NO_LIBRARY_CONTENT: &str = "No library content found. Please save before executing.";
pub const FHIR_VERSION_DEFAULTED: &str =
    "Unable to determine version of FHIR used. Defaulting to R4.";
pub const REMOTE_WITHOUT_CONTEXTS: &str =
    "Remote connection is selected but no contexts are provided.";
pub const TEST_CASE_FILTER_IGNORED: &str =
    "Test case filter ignored: contexts come from connection";

/// One context to evaluate against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBinding {
    pub context_type: String,
    pub context_value: String,
    /// Model data location (URI), when one is known
    pub model_path: Option<String>,
}

/// Everything needed to run one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationParameters {
    /// Engine tokens; `None` when the CQL file does not exist
    pub operation_args: Option<ArgList>,
    /// File receiving the transcript
    pub output_path: Option<PathBuf>,
    /// Root searched for test cases
    pub test_path: Option<PathBuf>,
    /// Test cases excluded by the test configuration, with their reasons
    pub excluded: IndexMap<String, String>,
}

impl EvaluationParameters {
    /// Whether the parameters can be dispatched
    pub fn is_ready(&self) -> bool {
        self.operation_args.is_some() && self.output_path.is_some()
    }
}

/// Builds [`EvaluationParameters`] from the connection store and project layout
pub struct ParameterBuilder<'a> {
    store: &'a ConnectionStore,
    notifier: &'a dyn Notifier,
    project_root: Option<PathBuf>,
    measurement_period: Option<String>,
    test_case_filter: Vec<String>,
}

impl<'a> ParameterBuilder<'a> {
    pub fn new(store: &'a ConnectionStore, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            notifier,
            project_root: None,
            measurement_period: None,
            test_case_filter: Vec::new(),
        }
    }

    /// Use an explicit project root instead of searching for one
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn measurement_period(mut self, period: impl Into<String>) -> Self {
        self.measurement_period = Some(period.into());
        self
    }

    /// Restrict locally discovered test cases to the given names
    ///
    /// Contexts of a remote connection are not filtered; an info notice is
    /// raised when a filter is set while such a connection is in use.
    pub fn test_cases<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_case_filter = names.into_iter().map(Into::into).collect();
        self
    }

    /// Build the parameters for a CQL file and optional expression
    ///
    /// A missing file is not an error: an info notice is raised and all
    /// fields of the result are `None`. Errors are only returned when the
    /// output file cannot be created.
    pub fn build(&self, file: &Path, expression: Option<&str>) -> Result<EvaluationParameters> {
        if !file.is_file() {
            self.notifier.notify(Notice::info(NO_LIBRARY_CONTENT));
            return Ok(EvaluationParameters::default());
        }

        let layout = ProjectLayout::for_file(file, self.project_root.as_deref());
        let output_path = layout.ensure_output_file()?;
        let test_path = layout.test_root();

        let fhir_version = self.fhir_version(file);

        let excluded = TestConfig::load(&layout.test_config_path())
            .exclusions_for(layout.library_name());
        let excluded_names: Vec<String> = excluded.keys().cloned().collect();
        let bindings = self.resolve_contexts(&layout, &excluded_names);

        log::debug!(
            "Building parameters for {} ({} context(s), FHIR {})",
            layout.library_name(),
            bindings.len(),
            fhir_version
        );

        let operation_args = self.operation_args(&layout, fhir_version, expression, &bindings);

        Ok(EvaluationParameters {
            operation_args: Some(operation_args),
            output_path: Some(output_path),
            test_path: Some(test_path),
            excluded,
        })
    }

    fn fhir_version(&self, file: &Path) -> FhirVersion {
        let source = fs::read_to_string(file).unwrap_or_else(|e| {
            log::warn!("Failed to read {}: {}", file.display(), e);
            String::new()
        });

        FhirVersion::detect(&source).unwrap_or_else(|| {
            self.notifier.notify(Notice::info(FHIR_VERSION_DEFAULTED));
            FhirVersion::default()
        })
    }

    /// Contexts to evaluate against for a library
    pub fn resolve_contexts(
        &self,
        layout: &ProjectLayout,
        excluded: &[String],
    ) -> Vec<ContextBinding> {
        let connection = self.store.current_connection();

        if let Some(connection) = connection.filter(|c| !c.is_local()) {
            if !connection.contexts.is_empty() {
                if !self.test_case_filter.is_empty() {
                    self.notifier.notify(Notice::info(format!(
                        "{} '{}'.",
                        TEST_CASE_FILTER_IGNORED, connection.name
                    )));
                }
                let model_path = Some(connection.endpoint.clone()).filter(|e| !e.is_empty());
                return connection
                    .contexts
                    .values()
                    .map(|context| ContextBinding {
                        context_type: context.resource_type.clone(),
                        context_value: context.resource_id.clone(),
                        model_path: model_path.clone(),
                    })
                    .collect();
            }

            self.notifier.notify(Notice::error(REMOTE_WITHOUT_CONTEXTS));
        }

        let test_data = discover_test_cases(&layout.test_root(), layout.library_name(), excluded);
        if test_data.is_missing() {
            log::debug!(
                "No test data for {} under {}",
                layout.library_name(),
                layout.test_root().display()
            );
        }

        test_data
            .into_test_cases()
            .into_iter()
            .filter(|case| {
                self.test_case_filter.is_empty() || self.test_case_filter.contains(&case.name)
            })
            .map(|case| ContextBinding {
                context_type: PATIENT_CONTEXT.to_string(),
                context_value: case.name,
                model_path: Some(to_uri(&case.path)),
            })
            .collect()
    }

    fn operation_args(
        &self,
        layout: &ProjectLayout,
        fhir_version: FhirVersion,
        expression: Option<&str>,
        bindings: &[ContextBinding],
    ) -> ArgList {
        let library_name = layout.library_name();
        let library_url = to_uri(layout.library_dir());
        let terminology = Some(to_uri(&layout.terminology_dir()));
        let expression = expression.filter(|e| !e.is_empty());
        let measurement_period = self.measurement_period.as_deref().filter(|p| !p.is_empty());
        let options_path = layout.options_path();

        let mut args = ArgList::operation(CQL_OPERATION);
        args.push(Flag::FhirVersion, fhir_version);
        args.push_if(Flag::OptionsPath, to_uri(&options_path), options_path.is_file());

        let blocks: Vec<Option<&ContextBinding>> = if bindings.is_empty() {
            vec![None]
        } else {
            bindings.iter().map(Some).collect()
        };

        for binding in blocks {
            args.push(Flag::LibraryName, library_name)
                .push(Flag::LibraryUrl, &library_url)
                .push_opt(Flag::Expression, expression)
                .push_opt(Flag::Terminology, terminology.as_deref());

            if let Some(model_path) = binding.and_then(|b| b.model_path.as_ref()) {
                args.push(Flag::Model, MODEL_TYPE).push(Flag::ModelUrl, model_path);
            }

            if let Some(period) = measurement_period {
                args.push(
                    Flag::Parameter,
                    format!("{}.\"{}\"", library_name, MEASUREMENT_PERIOD),
                )
                .push(Flag::ParameterValue, period);
            }

            if let Some(binding) = binding {
                args.push(Flag::Context, &binding.context_type)
                    .push(Flag::ContextValue, &binding.context_value);
            }
        }

        args
    }
}
