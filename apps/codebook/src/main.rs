//! # Codebook
//!
//! Build, evaluate, compare and score codebook reasoning graphs.
//!
//! ## Usage
//!
//! ```bash
//! # Build a graph from an extractor descriptor
//! codebook build -i descriptor.json -o graph.json
//!
//! # Propagate leaf values
//! codebook evaluate -g graph.json -a leaves.json
//!
//! # Score a predicted derivation against the reference
//! codebook score -r reference.json -p predicted.json --check-values
//! ```

use clap::Parser;
use codebook::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // CODEBOOK_LOG_FORMAT=json switches to structured logs
    let log_format = std::env::var("CODEBOOK_LOG_FORMAT").unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "codebook=info,codebook_core=info".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if cli.verbose {
        tracing::debug!("Parsed arguments: {:?}", cli);
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner to stderr so stdout stays machine-readable.
fn print_banner() {
    eprintln!(
        "codebook v{} | evaluate and score reasoning graphs",
        env!("CARGO_PKG_VERSION")
    );
}
