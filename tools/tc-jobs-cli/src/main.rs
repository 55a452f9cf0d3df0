//! tcjobs - Check content invalidation jobs against a Traffic Ops snapshot.
//!
//! Commands:
//! - `tcjobs validate` - Validate a job request and report overlapping jobs
//! - `tcjobs conflicts` - Report jobs overlapping a proposed window
//! - `tcjobs parse-time` - Decode a request timestamp
//! - `tcjobs ttl` - Normalize a request TTL

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConflictsArgs, ParseTimeArgs, TtlArgs, ValidateArgs};

/// tcjobs - Validate content invalidation jobs offline
#[derive(Parser)]
#[command(name = "tcjobs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a job request
    Validate(ValidateArgs),

    /// Report jobs overlapping a proposed window
    Conflicts(ConflictsArgs),

    /// Decode a timestamp the way job requests are decoded
    ParseTime(ParseTimeArgs),

    /// Normalize a TTL to whole hours
    Ttl(TtlArgs),
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let ctx = context::Context::load(cli.config.as_deref(), output)?;

    let level = if cli.verbose { "debug" } else { ctx.config.log_level.as_str() };
    init_tracing(level);
    tracing::debug!(cwd = %ctx.cwd.display(), store = ?ctx.config.store, "configuration loaded");

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::run(args, &ctx),
        Commands::Conflicts(args) => commands::conflicts::run(args, &ctx),
        Commands::ParseTime(args) => commands::parse_time::run(args, &ctx),
        Commands::Ttl(args) => commands::ttl::run(args, &ctx),
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
