//! CLI argument parsing for kbase.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resumable knowledge bases
///
/// Chunks text into records, embeds them through a remote embedding
/// service, and keeps a document log and a vector index in step.
#[derive(Parser, Debug)]
#[command(name = "kbase")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/kbase/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the knowledge base root directory
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// kbase commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List knowledge bases
    List,

    /// Chunk text files and save them into a knowledge base
    Ingest {
        /// Knowledge base name
        name: String,

        /// Files or directories (.txt, .md)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Language tag stamped on every record
        #[arg(long)]
        language: Option<String>,
    },

    /// Embed records that have no vector yet
    Resume {
        /// Knowledge base name
        name: String,

        /// Records per committed batch
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Show document and vector counts and consistency status
    Details {
        /// Knowledge base name
        name: String,
    },

    /// Keyword search within one knowledge base
    Search {
        /// Knowledge base name
        name: String,

        /// Case-insensitive substring
        keyword: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Print the stored vector at a position
    Vector {
        /// Knowledge base name
        name: String,

        /// Position in the vector index
        position: usize,
    },

    /// Delete a knowledge base
    Delete {
        /// Knowledge base name
        name: String,
    },

    /// Search one or more knowledge bases
    Query {
        /// Question text
        question: String,

        /// Knowledge bases to search (repeatable)
        #[arg(long = "kb", required = true)]
        kbs: Vec<String>,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
