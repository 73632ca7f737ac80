mod changes;
mod codec;
mod commands;
mod config;
mod diagnostics;
mod error;
mod grammar;
mod index;
mod method_resolver;
mod sink;
mod source_model;
mod task;
mod types;
mod vcs;
mod watch;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::{Options, OutputFormat, Selection};
use crate::error::Error;
use crate::task::CancelFlag;

/// Exit code for a selection cancelled before delivery.
const EXIT_CANCELLED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "testimpact",
    version,
    about = "Select the tests that cover changed code"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Reverse index to query (default: `index` in .testimpact.toml)
    #[arg(long, global = true)]
    index: Option<PathBuf>,
    /// Worker threads for scanning changed files (default: `jobs` in .testimpact.toml)
    #[arg(long, global = true)]
    jobs: Option<usize>,
    /// Log level used when `RUST_LOG` is not set
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the raw index entry for a key such as `com.acme.Foo.bar`
    Lookup {
        /// Qualified method key
        key: String,
    },
    /// List changed methods and the index keys they are looked up under
    Methods {
        /// Only changes against this git revision
        #[arg(long = "changelist")]
        change_list: Option<String>,
    },
    /// Print the test patterns affected by changed code or by one test position
    Select {
        #[command(flatten)]
        selection: SelectArgs,
    },
    /// Select once, then select again whenever files change
    Watch {
        #[command(flatten)]
        selection: SelectArgs,
    },
}

/// Log verbosity for the `--log-level` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// Per-file and per-lookup detail.
    Debug,
    /// Failures only.
    Error,
    /// Progress summaries.
    Info,
    /// Everything.
    Trace,
    /// Recoverable problems that were skipped.
    Warn,
}

/// Arguments shared by `select` and `watch`.
#[derive(Args)]
struct SelectArgs {
    /// Only changes against this git revision
    #[arg(long = "changelist", conflicts_with = "position")]
    change_list: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Test position such as `com,acme,Foo,bar` instead of scanning changes
    #[arg(long)]
    position: Option<String>,
}

impl LogLevel {
    /// The `EnvFilter` directive for this level.
    fn directive(self) -> &'static str {
        return match self {
            Self::Debug => "debug",
            Self::Error => "error",
            Self::Info => "info",
            Self::Trace => "trace",
            Self::Warn => "warn",
        };
    }
}

impl From<SelectArgs> for Selection {
    fn from(args: SelectArgs) -> Self {
        return Self {
            change_list: args.change_list,
            format: args.format,
            position: args.position,
        };
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `--log-level`.
/// Logs go to stderr; stdout carries only results.
fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let options = Options {
        index: cli.index,
        jobs: cli.jobs,
    };
    let result = match cli.command {
        Commands::Lookup { key } => commands::lookup(&options, &key),
        Commands::Methods { change_list } => {
            commands::methods(&options, change_list.as_deref()).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Select { selection } => {
            commands::select(&options, &selection.into(), CancelFlag::default())
                .map(|()| return ExitCode::SUCCESS)
        },
        Commands::Watch { selection } => watch::run(&options, &selection.into()),
    };

    return match result {
        Err(e @ Error::Cancelled) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_CANCELLED)
        },
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
        Ok(code) => code,
    };
}
