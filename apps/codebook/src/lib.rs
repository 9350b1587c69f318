//! # codebook
//!
//! Command-line front end for [`codebook_core`].
//!
//! The binary in `main.rs` only sets up logging and parses arguments; the
//! command implementations and the configuration file live here so they can
//! be exercised from integration tests.

pub mod cli;
pub mod config;
