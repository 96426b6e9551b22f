//! CLI module for the mdo command-line interface.
//!
//! Each command opens the configured store, runs one operation and prints
//! the result as text or JSON.

mod commands;
mod output;

pub use commands::*;
