//! loadscope: attribute sampled CPU load to application components.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use loadscope::category::{ComponentCategory, EventKind};
use loadscope::output::escape_field;
use loadscope::store::{PerfStore, StepFilter, Tabular};
use loadscope::{Analyzer, AnalyzerConfig};

#[derive(Parser)]
#[command(name = "loadscope")]
#[command(about = "Attribute sampled CPU load to application components")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze perf trace databases
    Analyze {
        /// Trace database, one per step group
        #[arg(short, long, required = true)]
        trace: Vec<PathBuf>,

        /// Package name of the analyzed application
        #[arg(short, long)]
        package: String,

        /// Test scene selecting scene-specific process rules
        #[arg(short, long)]
        scene: Option<String>,

        /// Rule file replacing the built-in rules
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Module manifest of the application
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Package-manager dependency list
        #[arg(short, long)]
        deps: Vec<PathBuf>,

        /// Directory for the CSV export and JSON summaries
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Store database to write
        #[arg(long)]
        store: Option<PathBuf>,

        /// Merge into an existing store instead of replacing it
        #[arg(long, requires = "store")]
        merge: bool,

        /// Number of step groups analyzed in parallel
        #[arg(short = 'j', long, default_value = "1")]
        workers: usize,

        /// Process id of step marker events
        #[arg(long, default_value_t = loadscope::trace::STEP_MARKER_PID, allow_negative_numbers = true)]
        marker_pid: i64,
    },
    /// Query a store written by `analyze`
    Query {
        /// Path to the store database
        #[arg(short, long)]
        store: PathBuf,

        /// Output format: table, csv, json
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Event kind: cycles, instructions
        #[arg(short, long, default_value = "cycles")]
        kind: EventKind,

        #[command(subcommand)]
        query: Query,
    },
}

#[derive(Subcommand)]
enum Query {
    /// Self and inclusive load per category and step
    Categories,
    /// Steps ranked by instructions
    Steps,
    /// Files ranked by self load
    Files {
        /// Step id or 'all'
        #[arg(long, default_value = "all")]
        step: StepFilter,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Symbols of one file ranked by self load
    Symbols {
        #[arg(long)]
        step: u32,
        #[arg(long)]
        file: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Files of one category
    CategoryFiles {
        #[arg(short, long)]
        category: ComponentCategory,
        /// Step id or 'all'
        #[arg(long, default_value = "all")]
        step: StepFilter,
    },
    /// All test steps
    TestSteps,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

const MAX_COLUMN_WIDTH: usize = 50;

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("(no results)");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }

    for w in &mut widths {
        *w = (*w).min(MAX_COLUMN_WIDTH);
    }

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths.get(i).copied().unwrap_or(10)))
        .collect();
    println!("{}", header_line.join(" | "));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", sep.join("-+-"));

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let width = widths.get(i).copied().unwrap_or(10);
                let truncated = if v.chars().count() > width && width > 3 {
                    let head: String = v.chars().take(width - 3).collect();
                    format!("{head}...")
                } else {
                    v.clone()
                };
                format!("{truncated:width$}")
            })
            .collect();
        println!("{}", row_line.join(" | "));
    }
}

fn print_rows<T: Tabular + Serialize>(rows: &[T], format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(rows)?),
        "csv" => {
            println!("{}", T::headers().join(","));
            for row in rows {
                let cells: Vec<String> = row.cells().iter().map(|c| escape_field(c)).collect();
                println!("{}", cells.join(","));
            }
        }
        "table" => {
            let cells: Vec<Vec<String>> = rows.iter().map(T::cells).collect();
            print_table(T::headers(), &cells);
        }
        _ => bail!("Invalid format: {format}. Must be one of: table, csv, json"),
    }
    eprintln!("\n{} rows returned", rows.len());
    Ok(())
}

fn run_query(store: PathBuf, format: &str, kind: EventKind, query: Query) -> Result<()> {
    if !store.exists() {
        bail!("Store not found: {}", store.display());
    }
    let store = PerfStore::open(&store)?;

    match query {
        Query::Categories => print_rows(&store.category_totals(kind)?, format),
        Query::Steps => print_rows(&store.steps_by_instructions()?, format),
        Query::Files { step, limit } => print_rows(&store.top_files(step, kind, limit)?, format),
        Query::Symbols { step, file, limit } => {
            print_rows(&store.top_symbols(step, &file, kind, limit)?, format)
        }
        Query::CategoryFiles { category, step } => {
            print_rows(&store.category_files(category, step, kind)?, format)
        }
        Query::TestSteps => print_rows(&store.test_steps()?, format),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            trace,
            package,
            scene,
            rules,
            manifest,
            deps,
            output,
            store,
            merge,
            workers,
            marker_pid,
        } => {
            let config = AnalyzerConfig {
                verbosity: cli.verbose,
                traces: trace,
                package_name: package,
                scene,
                rules,
                module_manifest: manifest,
                dependency_lists: deps,
                output_dir: output,
                store,
                merge_store: merge,
                workers,
                marker_pid,
            };
            let sum = Analyzer::new(config)?.run()?;
            for result in &sum.steps {
                info!(
                    "Step {} {}: count {} app_count {}",
                    result.step.id, result.step.name, result.sum.count, result.sum.app_count
                );
            }
            let cells: Vec<Vec<String>> = sum
                .steps
                .iter()
                .map(|r| {
                    vec![
                        r.step.id.to_string(),
                        r.step.name.clone(),
                        r.sum.total[EventKind::Cycles.index()].to_string(),
                        r.sum.total[EventKind::Instructions.index()].to_string(),
                        r.sum.count.to_string(),
                        r.sum.app_count.to_string(),
                    ]
                })
                .collect();
            print_table(
                &["step", "name", "cycles", "instructions", "count", "app_count"],
                &cells,
            );
            eprintln!("\n{} steps analyzed", sum.steps.len());
            Ok(())
        }
        Commands::Query {
            store,
            format,
            kind,
            query,
        } => run_query(store, &format, kind, query),
    }
}
