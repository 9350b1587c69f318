//! # Codebook CLI Module
//!
//! This module implements the CLI interface for codebook graphs.
//!
//! ## Available Commands
//!
//! - `build` - Build a graph from an extractor descriptor
//! - `evaluate` - Propagate leaf values through a graph
//! - `compare` - Compare two graphs
//! - `score` - Score a predicted derivation against a reference graph
//! - `inspect` - Show structure and diagnostics of a graph

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use codebook_core::{CodebookError, EqualityMode};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Codebook - evaluate and score reasoning graphs
///
/// A codebook defines concepts whose truth value is supplied or derived
/// through boolean formulas over other concepts.
#[derive(Parser, Debug)]
#[command(name = "codebook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Optional TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a graph from an extractor descriptor
    Build {
        /// Descriptor file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; the graph is printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on dangling edges and malformed formulas
        #[arg(long, overrides_with = "no_strict")]
        strict: bool,

        /// Collect dangling edges and malformed formulas as warnings
        #[arg(long, overrides_with = "strict")]
        no_strict: bool,
    },

    /// Propagate leaf values through a graph
    Evaluate {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Leaf assignment file: a JSON object of node id to value
        #[arg(short, long)]
        assignments: Option<PathBuf>,

        /// Write the evaluated graph to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two graphs
    Compare {
        /// First graph file
        left: PathBuf,

        /// Second graph file
        right: PathBuf,

        /// Equality mode (exact, structural, canonical)
        #[arg(short, long)]
        mode: Option<EqualityMode>,
    },

    /// Score a predicted derivation against a reference graph
    Score {
        /// Reference graph file
        #[arg(short, long)]
        reference: PathBuf,

        /// Predicted graph file
        #[arg(short, long)]
        predicted: PathBuf,

        /// The predicted file is an extractor descriptor, not a graph
        #[arg(long)]
        extracted: bool,

        /// Compare node values on top of structure
        #[arg(long, overrides_with = "no_check_values")]
        check_values: bool,

        /// Compare structure only
        #[arg(long, overrides_with = "check_values")]
        no_check_values: bool,
    },

    /// Show structure and diagnostics of a graph
    Inspect {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve a `--flag` / `--no-flag` pair. `None` defers to the config file.
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CodebookError> {
    let config = Config::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    let output = match cli.command {
        Commands::Build {
            input,
            output,
            strict,
            no_strict,
        } => cmd_build(
            &config,
            json_mode,
            &input,
            output.as_deref(),
            flag_pair(strict, no_strict),
        ),
        Commands::Evaluate {
            graph,
            assignments,
            output,
        } => cmd_evaluate(
            &config,
            json_mode,
            &graph,
            assignments.as_deref(),
            output.as_deref(),
        ),
        Commands::Compare { left, right, mode } => {
            cmd_compare(&config, json_mode, &left, &right, mode)
        }
        Commands::Score {
            reference,
            predicted,
            extracted,
            check_values,
            no_check_values,
        } => cmd_score(
            &config,
            json_mode,
            &reference,
            &predicted,
            extracted,
            flag_pair(check_values, no_check_values),
        ),
        Commands::Inspect { graph } => cmd_inspect(&config, json_mode, &graph),
    }?;

    println!("{}", output);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
