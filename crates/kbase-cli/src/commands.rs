//! Command implementations for the kbase CLI.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use kbase_service::{HealthStatus, KnowledgeBaseService, RetrievalMode};
use kbase_types::Settings;

use crate::chunking::{collect_files, records_from_file};
use crate::cli::{Cli, Commands};
use crate::progress::TerminalProgress;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        settings.data_dir = data_dir.clone();
    }
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one CLI invocation.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level);
    debug!(data_dir = %settings.data_dir, "Loaded settings");

    let service = KnowledgeBaseService::from_settings(&settings)
        .context("Failed to open knowledge base service")?;
    let json = cli.json;

    match cli.command {
        Commands::List => {
            let names = service.list_kbs()?;
            if json {
                print_json(&names)?;
            } else if names.is_empty() {
                println!("No knowledge bases");
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }

        Commands::Ingest {
            name,
            paths,
            language,
        } => {
            let files = collect_files(&paths)?;
            let mut records = Vec::new();
            for file in &files {
                records.extend(records_from_file(file, settings.chunking.max_chars)?);
            }
            info!(kb = %name, files = files.len(), chunks = records.len(), "Ingesting");

            let progress = TerminalProgress::new(format!("Embedding {}", name));
            let outcome = service
                .save_kb(&name, records, language.as_deref(), &progress)
                .await
                .with_context(|| format!("Failed to save knowledge base '{}'", name))?;
            progress.finish();

            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "{}: {} documents, {} vectors ({} added, {} failed)",
                    name, outcome.doc_count, outcome.vector_count, outcome.added, outcome.failed
                );
                if outcome.vector_count < outcome.doc_count {
                    println!("Run `kbase resume {}` to embed the missing records", name);
                }
            }
        }

        Commands::Resume { name, batch_size } => {
            let progress = TerminalProgress::new(format!("Resuming {}", name));
            let result = service
                .resume_kb_embedding(&name, batch_size, &progress)
                .await;
            progress.finish();
            let result = result.with_context(|| {
                format!(
                    "Resume of '{}' stopped; committed batches are kept, run it again to continue",
                    name
                )
            })?;

            if json {
                print_json(&result)?;
            } else if result.is_complete() {
                println!("{}: up to date ({}/{})", name, result.current, result.total);
            } else {
                println!(
                    "{}: {}/{} embedded, run `kbase resume {}` again",
                    name, result.current, result.total, name
                );
            }
        }

        Commands::Details { name } => {
            let report = service.get_kb_details(&name)?;
            if json {
                print_json(&report)?;
            } else {
                println!("Knowledge base: {}", report.name);
                println!("  documents: {}", report.doc_count);
                println!("  vectors:   {}", report.vector_count);
                println!("  status:    {}", report.status);
                match report.status {
                    HealthStatus::Mismatch => println!(
                        "  missing:   {} (repair with `kbase resume {}`)",
                        report.missing, name
                    ),
                    HealthStatus::Corrupted => {
                        if let Some(detail) = &report.detail {
                            println!("  detail:    {}", detail);
                        }
                        println!("  delete and re-ingest, or run `kbase resume` to rebuild");
                    }
                    HealthStatus::Empty | HealthStatus::Healthy => {}
                }
            }
        }

        Commands::Search {
            name,
            keyword,
            limit,
        } => {
            let matches = service.search_kb_chunks(&name, &keyword, limit)?;
            if json {
                print_json(&matches)?;
            } else if matches.is_empty() {
                println!("No matches");
            } else {
                for m in matches {
                    println!("[{}] {}", m.position, preview(&m.record.content, 120));
                }
            }
        }

        Commands::Vector { name, position } => {
            let vector = service.get_chunk_vector(&name, position)?;
            if json {
                print_json(&vector)?;
            } else {
                println!("position:  {}", vector.position);
                println!("dimension: {}", vector.values.len());
                println!("content:   {}", preview(&vector.content, 120));
                let head: Vec<String> = vector
                    .values
                    .iter()
                    .take(8)
                    .map(|v| format!("{:.4}", v))
                    .collect();
                println!("values:    [{}, ...]", head.join(", "));
            }
        }

        Commands::Delete { name } => {
            let existed = service.delete_kb(&name).await?;
            if json {
                print_json(&serde_json::json!({ "name": name, "deleted": existed }))?;
            } else if existed {
                println!("Deleted {}", name);
            } else {
                println!("No knowledge base named {}", name);
            }
        }

        Commands::Query {
            question,
            kbs,
            top_k,
        } => {
            let knowledge = service.load_kbs(&kbs)?;
            for skipped in &knowledge.skipped {
                eprintln!("warning: skipped {}: {}", skipped.name, skipped.reason);
            }
            let result = service.search_loaded(&knowledge, &question, top_k).await?;

            if json {
                print_json(&result)?;
            } else {
                if result.mode == RetrievalMode::Keyword {
                    if let Some(reason) = &result.fallback_reason {
                        eprintln!("note: keyword search ({})", reason);
                    }
                }
                if result.hits.is_empty() {
                    println!("No results");
                }
                for (rank, hit) in result.hits.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {}: {}",
                        rank + 1,
                        hit.score,
                        hit.kb.as_deref().unwrap_or("?"),
                        preview(&hit.content, 200)
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First `max` characters on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}
