//! CLI module
//!
//! Command-line interface for running the extractor.
//!
//! # Commands
//!
//! - `check` - Load stored tokens and obtain an access token
//! - `discover` - Print the catalog with stream schemas
//! - `read` - Extract data from streams
//! - `streams` - List stream names

mod commands;
mod runner;

pub use commands::{parse_stream_list, Cli, Commands, OutputFormat};
pub use runner::Runner;
