//! File outputs of an analysis run.
//!
//! - `load_detail.csv`: every detail row, spreadsheet friendly
//! - `summary.json`: per step, main-application rows and managed-library
//!   components
//! - `digest.json`: per step, redistributed event counts

mod csv;
mod summary;

pub use csv::{escape_field, write_detail_csv, CSV_HEADERS, MAX_SYMBOL_LEN};
pub use summary::{build_digest, build_summary, DigestEntry, StepSummary};

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::analyzer::PerfSum;

pub const DETAIL_CSV: &str = "load_detail.csv";
pub const SUMMARY_JSON: &str = "summary.json";
pub const DIGEST_JSON: &str = "digest.json";

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Write the CSV export, summary and digest of a run into `dir`.
pub fn write_outputs(dir: &Path, sum: &PerfSum, package_name: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let csv_path = dir.join(DETAIL_CSV);
    let file = File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_detail_csv(&mut writer, sum)?;
    writer.flush()?;

    write_json(&dir.join(SUMMARY_JSON), &build_summary(sum, package_name))?;
    write_json(&dir.join(DIGEST_JSON), &build_digest(sum))?;

    info!("Wrote outputs to {}", dir.display());
    Ok(())
}
