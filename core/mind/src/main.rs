//! Daily life simulation driver
//!
//! Usage:
//!   daylife --start 2025-01-01 --end 2025-01-07 --events events.json --persona persona.json
//!
//! The model backend comes from LLM_PROVIDER / OLLAMA_* / OPENAI_* environment
//! variables; output location and timeouts from DAYLIFE_* variables.

use anyhow::{Context, Result};
use clap::Parser;
use daylife_indexing::{HashingEmbedder, MemoryRegistry};
use daylife_mind::{
    build_llm, DayScheduler, FileLogAppender, JsonRecordStore, LlmConfig, LlmRoutePlanner,
    MindConfig, PipelineRunner, PipelineSettings, Services, SharedContext,
};
use daylife_schemas::{generate_run_id, ContextKey, Event};
use daylife_timeline::{format_day, parse_day, FixedHolidays};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "daylife")]
#[command(about = "Simulate a persona's days with a language model")]
struct Args {
    /// First day to simulate (YYYY-MM-DD)
    #[arg(long)]
    start: String,

    /// Last day to simulate, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: String,

    /// JSON file holding the initial event forest
    #[arg(long)]
    events: PathBuf,

    /// JSON file holding the persona
    #[arg(long)]
    persona: PathBuf,

    /// Output directory for records, snapshots and the log
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Seconds to wait for each day before reporting it as timed out
    #[arg(long)]
    join_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("daylife v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = MindConfig::from_env()?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(secs) = args.join_timeout_secs {
        config.join_timeout = Duration::from_secs(secs);
    }

    let start = parse_day(&args.start).context("Invalid --start")?;
    let end = parse_day(&args.end).context("Invalid --end")?;

    let events: Vec<Event> = read_json(&args.events)?;
    let persona: Value = read_json(&args.persona)?;
    info!(
        "Loaded {} storylines, output to {}",
        events.len(),
        config.output_dir.display()
    );

    let run_id = generate_run_id();
    info!("Run id: {}", run_id);

    let llm = build_llm(LlmConfig::from_env()?)?;

    let context = Arc::new(SharedContext::new());
    context.set(ContextKey::Persona, persona);

    let memory = Arc::new(MemoryRegistry::new(Arc::new(HashingEmbedder::default())));

    let services = Services {
        llm: llm.clone(),
        route: Arc::new(LlmRoutePlanner::new(llm)),
        records: Arc::new(JsonRecordStore::new(&config.output_dir)?),
        log: Arc::new(FileLogAppender::new(&config.output_dir, run_id.clone())?),
        context,
        memory: memory.clone(),
        holidays: Arc::new(FixedHolidays::with_defaults()),
    };

    let settings = PipelineSettings {
        run_id,
        country: config.country.clone(),
        addresses: config.addresses.clone(),
    };

    let runner = Arc::new(PipelineRunner::new(events, services, settings));
    let scheduler = DayScheduler::new(runner, memory, config.join_timeout);

    let report = scheduler.run(start, end).await?;

    for date in &report.completed {
        info!("✓ {}", format_day(*date));
    }
    for (date, err) in &report.failed {
        error!("✗ {}: {}", format_day(*date), err);
    }
    for date in &report.timed_out {
        error!("⏱ {} did not finish in time", format_day(*date));
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} days failed, {} timed out",
            report.failed.len(),
            report.timed_out.len()
        );
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Malformed JSON in {}", path.display()))
}
