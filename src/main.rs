//! Spancover CLI entry point.

use clap::Parser;
use spancover::cli::{self, Cli, Commands, EXIT_ERROR};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    spancover::init();

    let result = match &cli.command {
        Commands::Basic(args) => cli::run_basic(args),
        Commands::Detailed(args) => cli::run_detailed(args),
        Commands::Keywords(args) => cli::run_keywords(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        // Let env var control logging
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::stderr)
            .init();
    }
}
