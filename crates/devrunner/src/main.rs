//! devrunner - Universal project command runner
//!
//! "One command. Any toolchain."

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use devrunner::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();

    // The detached update process has nowhere to log to
    if !cli.internal_update_check {
        init_logging(cli.verbose);
    }

    process::exit(cli::run(cli));
}

/// `RUST_LOG` wins; otherwise warnings only, or debug for our crates
/// under `--verbose`
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("devrunner=debug,devrunner_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
