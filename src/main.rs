use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::process::ExitCode;

use account_mapping_guard::{
    import_mappings, init_tracing, load_csv, GuardConfig, HandleError, KeyField, MappingGuard,
    RecordEvent, SqliteStore, Verdict,
};

const USAGE: &str = "Usage:
  account-mapping-guard import <db> <csv>
  account-mapping-guard check <db> <event.json>
  account-mapping-guard list <db>";

fn main() -> Result<ExitCode> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = GuardConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("import") if args.len() == 4 => {
            run_import(&config, Path::new(&args[2]), Path::new(&args[3]))?;
            Ok(ExitCode::SUCCESS)
        }
        Some("check") if args.len() == 4 => {
            run_check(&config, Path::new(&args[2]), Path::new(&args[3]))
        }
        Some("list") if args.len() == 3 => {
            run_list(Path::new(&args[2]))?;
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

fn run_import(config: &GuardConfig, db_path: &Path, csv_path: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let keys = load_csv(csv_path)?;
    println!("✓ Loaded {} mappings from CSV", keys.len());

    let store = SqliteStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    println!("✓ Database ready: {}", db_path.display());

    println!("\n💾 Inserting mappings...");
    let summary = import_mappings(&store, config, &keys)?;

    println!("✓ Inserted: {} mappings", summary.inserted);
    println!("✓ Rejected duplicates: {}", summary.duplicates);
    println!("✓ Database contains {} mappings", store.count()?);

    Ok(())
}

fn run_check(config: &GuardConfig, db_path: &Path, event_path: &Path) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("Failed to read event file {}", event_path.display()))?;
    let event: RecordEvent = serde_json::from_str(&raw).context("Failed to parse event")?;

    let store = SqliteStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let guard = MappingGuard::new(&store, config.clone());

    match guard.handle(&event) {
        Ok(Verdict::Accepted) => {
            println!("✅ No duplicate records found.");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Verdict::Skipped) => {
            println!(
                "ℹ️  Event targets '{}', not '{}'; nothing to check.",
                event.entity, config.entity
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(HandleError::Guard(err)) if err.is_duplicate() => {
            eprintln!("❌ {}", err);
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn run_list(db_path: &Path) -> Result<()> {
    let store = SqliteStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let records = store.all()?;
    for record in &records {
        let fields: Vec<String> = KeyField::ALL
            .iter()
            .map(|f| format!("{}={}", f, record.key.display_field(*f)))
            .collect();
        println!("{}  {}", record.id, fields.join("  "));
    }
    println!("\n{} mappings", records.len());

    Ok(())
}
