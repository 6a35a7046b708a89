//! kbase CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `chunking`: Splitting text files into records
//! - `commands`: Command implementations
//! - `progress`: Terminal progress rendering

pub mod chunking;
pub mod cli;
pub mod commands;
pub mod progress;

pub use chunking::{chunk_text, collect_files, records_from_file};
pub use cli::{Cli, Commands};
pub use commands::{init_logging, load_settings, run};
pub use progress::TerminalProgress;
