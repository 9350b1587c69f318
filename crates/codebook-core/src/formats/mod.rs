//! # Formats Module
//!
//! Document formats for codebook graphs.
//!
//! Conversions here are pure: they turn graphs into text and back.
//! Reading and writing files is the app's job.

mod persistence;

pub use persistence::*;
