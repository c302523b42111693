//! Evaluation tooling for CQL projects
//!
//! This crate turns a CQL library inside an IG-style project into the
//! argument list understood by the CQL engine and renders the evaluation
//! transcript:
//! - Named data connections and their patient contexts
//! - Project layout conventions (`input/cql`, `input/tests`, ...)
//! - Test case discovery with exclusions and descriptions
//! - Evaluation parameter building
//! - Engine dispatch and result interleaving
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cql_runner::{ConnectionStore, LogNotifier, ParameterBuilder};
//!
//! let store = ConnectionStore::new();
//! let params = ParameterBuilder::new(&store, &LogNotifier)
//!     .build("input/cql/Example.cql".as_ref(), Some("InPopulation"))?;
//! ```

pub mod args;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod fhir_version;
pub mod layout;
pub mod notify;
pub mod params;
pub mod test_case;

pub use octofhir_cql_runner_diagnostics as diagnostics;

pub use args::{Arg, ArgList, Flag};
pub use connection::{
    Connection, ConnectionRef, ConnectionStorage, ConnectionStore, Context, JsonFileStorage,
    MemoryStorage,
};
pub use dispatcher::{
    ArgumentSummary, Dispatcher, Transcript, attempt_interleave, describe_arguments,
};
pub use engine::{CqlEngine, ElmFormat, EngineError, ProcessEngine};
pub use fhir_version::FhirVersion;
pub use layout::ProjectLayout;
pub use notify::{LogNotifier, NoticeCollector, Notifier};
pub use octofhir_cql_runner_diagnostics::{Notice, Result, RunnerError, Severity};
pub use params::{ContextBinding, EvaluationParameters, ParameterBuilder};
pub use test_case::{TestCase, TestCaseExclusion, TestConfig, TestData, discover_test_cases};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
