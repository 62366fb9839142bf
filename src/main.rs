use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use vitals_sheet::{
    logging, Cell, Limit, LogSettings, NewEntry, RecordError, Recorder, RecorderSettings,
    StoreSettings, TabularStore,
};

#[derive(Parser)]
#[command(name = "vitals-sheet", version, about = "Record and list blood-pressure readings")]
struct Cli {
    #[command(flatten)]
    store: StoreSettings,

    #[command(flatten)]
    recorder: RecorderSettings,

    #[command(flatten)]
    log: LogSettings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the most recent readings for a person
    List {
        #[arg(long)]
        name: Option<String>,
        /// A row count, or "all"
        #[arg(long)]
        limit: Option<Limit>,
    },
    /// Record one reading unless that date and time slot already exist
    Record {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "")]
        time: String,
        #[arg(long)]
        sys: String,
        #[arg(long)]
        dia: String,
    },
    /// Record every row of a CSV file (columns: date,time,sys,dia)
    Import {
        #[arg(long)]
        name: String,
        path: PathBuf,
    },
}

/// One CSV line; readings are kept exactly as written
#[derive(Debug, Deserialize)]
struct CsvRecord {
    date: String,
    #[serde(default)]
    time: String,
    sys: String,
    dia: String,
}

type CliRecorder = Recorder<std::sync::Arc<dyn TabularStore>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log)?;

    let store = cli.store.build().context("Failed to open record store")?;
    let timeout = cli.store.timeout()?;
    let recorder = Recorder::new(store, cli.recorder.to_config(timeout));

    match cli.command {
        Command::List { name, limit } => run_list(&recorder, name.as_deref(), limit).await,
        Command::Record {
            name,
            date,
            time,
            sys,
            dia,
        } => run_record(&recorder, NewEntry::new(name, date, time, sys, dia)).await,
        Command::Import { name, path } => run_import(&recorder, &name, &path).await,
    }
}

async fn run_list(recorder: &CliRecorder, name: Option<&str>, limit: Option<Limit>) -> Result<()> {
    let category = recorder.resolve_category(name).to_string();
    let entries = recorder.list_recent(name, limit).await?;

    if entries.is_empty() {
        println!("No readings for {}", category);
        return Ok(());
    }

    println!("📊 {} ({} readings)", category, entries.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let show = |cell: &Option<Cell>| cell.as_ref().map(Cell::to_string).unwrap_or_default();
    for entry in &entries {
        println!(
            "{:<12} {:<8} {:>5} / {:<5}",
            show(&entry.date),
            show(&entry.time),
            show(&entry.sys),
            show(&entry.dia)
        );
    }

    Ok(())
}

async fn run_record(recorder: &CliRecorder, input: NewEntry) -> Result<()> {
    match recorder.record_entry(input).await {
        Ok(()) => {
            println!("✓ Recorded");
            Ok(())
        }
        Err(RecordError::Duplicate { date, time, .. }) => {
            eprintln!("❌ Already recorded: {} {}", date, time);
            std::process::exit(2);
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_import(recorder: &CliRecorder, name: &str, path: &Path) -> Result<()> {
    println!("📂 Importing {} into {}", path.display(), name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut rdr = csv::Reader::from_path(path).context("Failed to open CSV file")?;

    let mut recorded = 0;
    let mut duplicates = 0;
    let mut invalid = 0;

    for (index, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row: CsvRecord =
            result.with_context(|| format!("Failed to parse CSV line {}", line))?;

        let input = NewEntry::new(name, row.date, row.time, row.sys, row.dia);
        match recorder.record_entry(input).await {
            Ok(()) => recorded += 1,
            Err(RecordError::Duplicate { .. }) => duplicates += 1,
            Err(RecordError::Validation { field }) => {
                tracing::warn!(line, field, "skipping incomplete CSV row");
                invalid += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Import stopped at line {} after {} rows", line, recorded)
                })
            }
        }
    }

    println!("✓ Recorded: {}", recorded);
    println!("✓ Skipped duplicates: {}", duplicates);
    if invalid > 0 {
        println!("⚠ Skipped incomplete rows: {}", invalid);
    }

    Ok(())
}
