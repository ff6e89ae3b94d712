//! # charter-cli
//!
//! Command-line interface for Charter.
//!
//! - `charter check <targets...>`: evaluate files, globs or inline code and
//!   gate a build on the result
//! - `charter query|sql|response`: run one pipeline stage on a request
//! - `charter rules`: list the rule catalog

mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use charter_guard::CharterConfig;
use tracing_subscriber::EnvFilter;

/// Charter: compliance checks for code, SQL and farmer-facing text.
#[derive(Parser)]
#[command(name = "charter", version, about)]
struct Cli {
    /// Path to charter.toml. Without this flag, ./charter.toml is used if
    /// it exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log evaluation progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate files, glob patterns or inline code.
    Check(commands::check::CheckArgs),
    /// Stage INPUT: validate a farmer's question.
    Query(commands::guard::QueryArgs),
    /// Stage SQL: validate a generated statement.
    Sql(commands::guard::SqlArgs),
    /// Stage RESPONSE: validate an answer before it is sent.
    Response(commands::guard::ResponseArgs),
    /// List the rule catalog.
    Rules {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<CharterConfig> {
    match explicit {
        Some(path) => Ok(CharterConfig::load(path)?),
        None => Ok(CharterConfig::load_or_default(Path::new("charter.toml"))),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Reports go to stdout; logs go to stderr.
    let level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("charter_core={}", level).parse()?)
                .add_directive(format!("charter_guard={}", level).parse()?)
                .add_directive(format!("charter={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Check(args) => commands::check::execute(args, &config),
        Commands::Query(args) => commands::guard::query(args, &config),
        Commands::Sql(args) => commands::guard::sql(args, &config),
        Commands::Response(args) => commands::guard::response(args, &config),
        Commands::Rules { json } => commands::rules::execute(*json, &config),
    }
}
