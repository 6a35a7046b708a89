//! kbase: resumable knowledge bases
//!
//! # Usage
//!
//! ```bash
//! kbase ingest notes ./docs
//! kbase resume notes
//! kbase details notes
//! kbase query "how do I configure X?" --kb notes --kb manuals
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/kbase/config.toml)
//! 3. Environment variables (KBASE_*)
//! 4. CLI flags

use anyhow::Result;

use kbase_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse_args()).await
}
