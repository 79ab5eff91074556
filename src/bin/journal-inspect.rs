//! # Batch Match Journal Inspector
//!
//! Command-line tool for checking whether a resume journal can be continued
//! under the current configuration, before committing to a long batch run.

use batchmatch_core::logging::init_structured_logging;
use batchmatch_core::{descriptors_equal, read_journal, BatchMatchConfig, QueryDescriptor};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "journal-inspect")]
#[command(about = "Inspect batch match resume journals")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment overrides still apply
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity); overrides logging.level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the query descriptor the current configuration produces
    Descriptor,

    /// Check a journal against the current configuration
    Check {
        /// Journal to inspect (default: the configured resume file)
        #[arg(short, long)]
        journal: Option<PathBuf>,

        /// Emit a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match BatchMatchConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            process::exit(2);
        }
    };
    match verbosity_level(cli.verbose) {
        Some(level) => config.logging.level = Some(level.to_string()),
        None => {
            config.logging.level.get_or_insert_with(|| "warn".to_string());
        }
    }
    init_structured_logging(&config.logging);

    let result = match &cli.command {
        Commands::Descriptor => show_descriptor(&config),
        Commands::Check { journal, json } => check_journal(&config, journal.clone(), *json),
    };

    match result {
        Ok(true) => {
            info!("Journal inspection completed successfully");
            process::exit(0);
        }
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Journal inspection failed: {}", e);
            eprintln!("❌ {e}");
            process::exit(2);
        }
    }
}

/// `-v` flags override the configured log level
fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn show_descriptor(config: &BatchMatchConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let descriptor = config.matcher.query_descriptor();
    println!("{descriptor}");
    for (name, values) in descriptor.iter() {
        println!("  {name} = {}", values.join(", "));
    }
    Ok(true)
}

fn check_journal(
    config: &BatchMatchConfig,
    journal: Option<PathBuf>,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let path = journal
        .or_else(|| config.resume_file.clone())
        .ok_or("no journal given and no resume_file configured")?;
    let current = config.matcher.query_descriptor();

    if json {
        return print_json_report(&path, &current);
    }

    println!("🔍 Inspecting journal {}", path.display());

    let Some(snapshot) = read_journal(&path)? else {
        println!("⚪ Nothing to resume: journal is missing, empty, or has no complete header");
        return Ok(true);
    };

    println!("   Completed items: {}", snapshot.completed_ids.len());
    println!("   Entry lines:     {}", snapshot.entries);
    if snapshot.discarded_lines > 0 {
        println!("⚠️  Discarded lines: {}", snapshot.discarded_lines);
    }

    if descriptors_equal(&snapshot.descriptor, &current) {
        println!("✅ Journal matches the current configuration");
        Ok(true)
    } else {
        println!("❌ Journal was written under a different configuration");
        println!("   stored:  {}", snapshot.descriptor);
        println!("   current: {current}");
        Ok(false)
    }
}

fn print_json_report(
    path: &Path,
    current: &QueryDescriptor,
) -> Result<bool, Box<dyn std::error::Error>> {
    let snapshot = read_journal(path)?;
    let matches = snapshot
        .as_ref()
        .map_or(true, |snapshot| descriptors_equal(&snapshot.descriptor, current));

    let report = match &snapshot {
        Some(snapshot) => json!({
            "journal": path.display().to_string(),
            "resumable": true,
            "completed": snapshot.completed_ids.len(),
            "entries": snapshot.entries,
            "discarded_lines": snapshot.discarded_lines,
            "stored_descriptor": snapshot.descriptor.to_query_string(),
            "current_descriptor": current.to_query_string(),
            "matches_current": matches,
        }),
        None => json!({
            "journal": path.display().to_string(),
            "resumable": false,
            "current_descriptor": current.to_query_string(),
            "matches_current": matches,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(matches)
}
