//! Command-line entry point for Hushpad.

mod replay;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use hushpad_core::models::document::{Document, DocumentSummary};
use hushpad_core::{Config, Database, DocumentStore};
use hushpad_editor::SessionOptions;
use replay::{ReplayOptions, ReplayReport, DEFAULT_CHARS_PER_SECOND};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hushpad", about = "Hushpad distraction-free writing store", version)]
struct Cli {
    /// Database directory (overrides DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents, most recently edited first
    List,
    /// Print a document's content
    Show { id: String },
    /// Create a document from the given text
    New { text: String },
    Delete { id: String },
    /// Type a file into a headless editor session
    Replay {
        file: String,
        /// Append to an existing document
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        focus: bool,
        #[arg(long)]
        typewriter: bool,
        /// Characters per second
        #[arg(long, default_value_t = DEFAULT_CHARS_PER_SECOND)]
        cps: u32,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("hushpad=info,hushpad_editor=info,hushpad_core=warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn format_summary_output(documents: &[DocumentSummary], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(documents)?);
    }
    let rows: Vec<String> = documents
        .iter()
        .map(|item| {
            format!(
                "{:<36} {:<30} {:>6}w  {}",
                item.id,
                item.title,
                item.word_count,
                item.updated_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();
    Ok(rows.join("\n"))
}

fn format_show_output(document: &Document, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(document)?);
    }
    Ok(document.content.clone())
}

fn format_replay_output(report: &ReplayReport, json: bool) -> Result<String> {
    if json {
        let transitions: Vec<serde_json::Value> = report
            .transitions
            .iter()
            .map(|(at, status)| {
                serde_json::json!({ "at_ms": at.as_millis() as u64, "status": status.label() })
            })
            .collect();
        let value = serde_json::json!({
            "id": report.document_id,
            "characters": report.characters,
            "word_count": report.word_count,
            "selection_runs": report.selection_runs,
            "transitions": transitions,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    let mut lines: Vec<String> = report
        .transitions
        .iter()
        .map(|(at, status)| format!("[{:>7.1}s] {}", at.as_secs_f64(), status.label()))
        .collect();
    lines.push(format!(
        "Replayed {} characters into {} ({} words, {} selection updates)",
        report.characters, report.document_id, report.word_count, report.selection_runs
    ));
    Ok(lines.join("\n"))
}

fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path))
}

fn run(cli: Cli) -> Result<()> {
    let Cli { db, json, command } = cli;
    let mut config = Config::from_env();
    if let Some(path) = db {
        config.db_path = path;
    }
    let db = open_database(&config)?;

    match command {
        Commands::List => {
            let documents = db.list_all()?;
            let summaries: Vec<DocumentSummary> =
                documents.iter().map(DocumentSummary::from).collect();
            let output = format_summary_output(&summaries, json)?;
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Commands::Show { id } => {
            let document = db
                .get(&id)?
                .ok_or_else(|| anyhow!("document not found: {}", id))?;
            println!("{}", format_show_output(&document, json)?);
        }
        Commands::New { text } => {
            let document = Document::new(text);
            db.create(&document)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                println!("Created: {} ({})", document.title, document.id);
            }
        }
        Commands::Delete { id } => {
            if !db.delete(&id)? {
                bail!("document not found: {}", id);
            }
            println!("Deleted document: {}", id);
        }
        Commands::Replay {
            file,
            id,
            focus,
            typewriter,
            cps,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file))?;
            let options = ReplayOptions {
                id,
                focus,
                typewriter,
                chars_per_second: cps,
            };
            let report = replay::replay(db, &text, SessionOptions::from_config(&config), &options)?;
            println!("{}", format_replay_output(&report, json)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    run(Cli::parse())
}
