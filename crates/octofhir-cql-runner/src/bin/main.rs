//! CQL runner command-line interface

use clap::{Parser, Subcommand};
use octofhir_cql_runner::cli::connections::{self, ConnectionAction};
use octofhir_cql_runner::cli::elm::{self, ElmConfig};
use octofhir_cql_runner::cli::execute::{self, ExecuteConfig};
use octofhir_cql_runner::cli::{GlobalConfig, output};
use octofhir_cql_runner::ElmFormat;
use std::path::PathBuf;

/// CQL runner
#[derive(Parser)]
#[command(name = "cql-runner")]
#[command(
    author,
    version,
    about = "Evaluate CQL libraries against project test data",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    /// Project root (default: searched from the CQL file)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Connection state file
    #[arg(long, env = "CQL_RUNNER_STATE", global = true)]
    state: Option<PathBuf>,

    /// Engine command line, e.g. "java -jar cql-ls-service.jar"
    #[arg(long, env = "CQL_RUNNER_ENGINE", global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a CQL library against its test cases or the current connection
    Execute {
        /// CQL file to execute
        file: PathBuf,

        /// Expression to evaluate (default: the whole library)
        #[arg(short, long)]
        expression: Option<String>,

        /// Only run these test cases
        #[arg(short, long = "test-case")]
        test_cases: Vec<String>,

        /// Measurement period parameter value
        #[arg(long)]
        measurement_period: Option<String>,
    },

    /// Evaluate every library of the project
    ExecuteAll {
        /// Expression to evaluate in each library
        #[arg(short, long)]
        expression: Option<String>,
    },

    /// Print the engine arguments for a library without executing it
    Args {
        /// CQL file
        file: PathBuf,

        /// Expression to evaluate
        #[arg(short, long)]
        expression: Option<String>,

        /// Only include these test cases
        #[arg(short, long = "test-case")]
        test_cases: Vec<String>,
    },

    /// List the test cases of a library
    TestCases {
        /// CQL file
        file: PathBuf,
    },

    /// Translate a library to ELM
    Elm {
        /// CQL file
        file: PathBuf,

        /// Output format (json, xml)
        #[arg(short = 'F', long = "format", default_value = "json")]
        format: ElmFormat,

        /// Output file (default: stdout)
        #[arg(short, long = "output")]
        output_file: Option<PathBuf>,
    },

    /// Manage connections
    Connection {
        #[command(subcommand)]
        command: ConnectionCommand,
    },

    /// Manage the contexts of a connection
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
}

#[derive(Subcommand)]
enum ConnectionCommand {
    /// List connections
    List,
    /// Add a connection or change its endpoint
    Add { name: String, endpoint: String },
    /// Remove a connection
    Remove { name: String },
    /// Make a connection current
    Use { name: String },
    /// Unset the current connection
    Clear,
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Add a context to a connection
    Add {
        connection: String,
        resource_id: String,
        /// Resource type
        #[arg(short = 't', long = "type", default_value = "Patient")]
        resource_type: String,
        /// Display name
        #[arg(short, long)]
        display: Option<String>,
    },
    /// Remove a context by key (<resourceType>/<resourceID>)
    Remove { connection: String, key: String },
}

impl From<ConnectionCommand> for ConnectionAction {
    fn from(command: ConnectionCommand) -> Self {
        match command {
            ConnectionCommand::List => Self::List,
            ConnectionCommand::Add { name, endpoint } => Self::Add { name, endpoint },
            ConnectionCommand::Remove { name } => Self::Remove { name },
            ConnectionCommand::Use { name } => Self::Use { name },
            ConnectionCommand::Clear => Self::Clear,
        }
    }
}

impl From<ContextCommand> for ConnectionAction {
    fn from(command: ContextCommand) -> Self {
        match command {
            ContextCommand::Add {
                connection,
                resource_id,
                resource_type,
                display,
            } => Self::AddContext {
                connection,
                resource_type,
                resource_id,
                display,
            },
            ContextCommand::Remove { connection, key } => Self::RemoveContext { connection, key },
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose {
        "octofhir_cql_runner=debug"
    } else {
        "octofhir_cql_runner=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    init_tracing(cli.verbose);

    let global = GlobalConfig {
        state: cli.state,
        engine: cli.engine,
        project: cli.project,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Execute {
            file,
            expression,
            test_cases,
            measurement_period,
        } => {
            let config = ExecuteConfig {
                file,
                expression,
                test_cases,
                measurement_period,
            };
            execute::execute(&global, config).await
        }

        Commands::ExecuteAll { expression } => execute::execute_all(&global, expression).await,

        Commands::Args {
            file,
            expression,
            test_cases,
        } => {
            let config = ExecuteConfig {
                file,
                expression,
                test_cases,
                ..Default::default()
            };
            execute::print_args(&global, config)
        }

        Commands::TestCases { file } => execute::list_test_cases(&global, &file),

        Commands::Elm {
            file,
            format,
            output_file,
        } => {
            let config = ElmConfig {
                file,
                format,
                output_file,
            };
            elm::view_elm(&global, config).await
        }

        Commands::Connection { command } => connections::run(&global, command.into()),

        Commands::Context { command } => connections::run(&global, command.into()),
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
