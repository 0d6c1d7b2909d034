//! CLI module for the narrator command-line interface.
//!
//! Runs the pipeline over an input corpus and prints or writes the results.

mod commands;
mod output;

pub use commands::*;
