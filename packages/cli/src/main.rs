mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, fmt, gen, init, CheckArgs, FmtArgs, GenArgs, InitArgs};
use tracing_subscriber::EnvFilter;

/// treeform - schema-driven document trees
#[derive(Parser, Debug)]
#[command(name = "treeform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new treeform project
    Init(InitArgs),

    /// Generate typed handle declarations from schemas
    Gen(GenArgs),

    /// Load a document and report integrity problems
    Check(CheckArgs),

    /// Rewrite a document in canonical form
    Fmt(FmtArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match command {
        Command::Init(args) => init(args, &cwd),
        Command::Gen(args) => gen(args, &cwd),
        Command::Check(args) => check(args, &cwd),
        Command::Fmt(args) => fmt(args, &cwd),
    }
}
