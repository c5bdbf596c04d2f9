//! Gravenhold - Entry Point
//!
//! Loads a template corpus, reports registry statistics, and optionally
//! exercises lookups against it. Useful for validating content before a
//! server picks it up.

use std::fs::File;
use std::io::BufReader;

use clap::Parser;
use serde::Serialize;

use gravenhold::core::error::Result;
use gravenhold::templates::{load_templates_sized, LootTables, TemplateRegistry};

/// Template corpus loader and inspector
#[derive(Parser, Debug)]
#[command(name = "gravenhold")]
#[command(about = "Load a template corpus and report on it")]
struct Args {
    /// Path to the template corpus file
    corpus: String,

    /// Hash table size (power of two recommended)
    #[arg(long, default_value_t = 8192)]
    table_size: usize,

    /// Template names to look up after loading
    #[arg(long)]
    find: Vec<String>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,
}

/// JSON output structure
#[derive(Serialize)]
struct CorpusReport {
    templates: usize,
    table_size: usize,
    lookups: u64,
    comparisons: u64,
    found: Vec<String>,
    missing: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gravenhold=info".into()),
        )
        .init();

    let args = Args::parse();

    tracing::info!("loading template corpus from {}", args.corpus);
    let file = File::open(&args.corpus)?;
    let mut reader = BufReader::new(file);
    let registry = load_templates_sized(&mut reader, args.table_size, &LootTables::new())?;

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in &args.find {
        match registry.find_quiet(name) {
            Some(_) => found.push(name.clone()),
            None => missing.push(name.clone()),
        }
    }

    let stats = registry.lookup_stats();
    match args.format.as_str() {
        "json" => {
            let report = CorpusReport {
                templates: registry.len(),
                table_size: registry.table_size(),
                lookups: stats.searches,
                comparisons: stats.comparisons,
                found,
                missing,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_report(&registry, &found, &missing);
        }
    }
    Ok(())
}

fn print_text_report(registry: &TemplateRegistry, found: &[String], missing: &[String]) {
    let stats = registry.lookup_stats();
    println!("templates loaded: {}", registry.len());
    println!("table size:       {}", registry.table_size());
    println!(
        "lookups:          {} ({} comparisons)",
        stats.searches, stats.comparisons
    );
    for name in found {
        println!("found:   {}", name);
    }
    for name in missing {
        println!("missing: {}", name);
    }
}
