//! Tron CLI: compile declarative service queries into a deployable Rust application.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tron",
    version,
    about = "Compile declarative service queries into a deployable Rust application"
)]
struct Cli {
    /// Log generation decisions (overrides TRON_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: tron::cli::Commands,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tron=debug")
    } else {
        EnvFilter::try_from_env("TRON_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = tron::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
