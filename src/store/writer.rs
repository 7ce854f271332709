//! Writer for the attributed-load store.
//!
//! Every `write` call runs in a single transaction. When any statement fails
//! the transaction is dropped without commit and SQLite rolls it back, so a
//! store never holds half of a batch.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::schema::create_schema;
use crate::aggregate::{PerfStepSum, PerfSymbolDetail};
use crate::category::{ComponentCategory, EventKind};
use crate::trace::TestStep;

pub struct PerfStore {
    pub(super) conn: Connection,
    path: PathBuf,
}

impl PerfStore {
    /// Create a fresh store at `path`, replacing any existing file.
    pub fn create(path: &Path) -> Result<Self> {
        for stale in [
            path.to_path_buf(),
            sidecar(path, "-wal"),
            sidecar(path, "-shm"),
        ] {
            if stale.exists() {
                fs::remove_file(&stale)
                    .with_context(|| format!("Failed to remove {}", stale.display()))?;
            }
        }
        Self::open(path)
    }

    /// Open an existing store for merging, creating it and any missing tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store: {}", path.display()))?;
        create_schema(&conn).context("Failed to create store schema")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Write steps with their category sums and detail rows, replacing
    /// whatever the store held for those step ids.
    pub fn write(
        &mut self,
        steps: &[TestStep],
        sums: &[PerfStepSum],
        details: &[PerfSymbolDetail],
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin transaction")?;

        {
            let mut delete_details =
                tx.prepare_cached("DELETE FROM perf_symbol_detail WHERE step_id = ?1")?;
            let mut delete_sums =
                tx.prepare_cached("DELETE FROM perf_category_sum WHERE step_id = ?1")?;
            let mut upsert_step = tx.prepare_cached(
                "INSERT OR REPLACE INTO test_step (id, group_id, name, start_ts, end_ts) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for step in steps {
                delete_details
                    .execute([step.id])
                    .with_context(|| format!("Failed to clear step {}", step.id))?;
                delete_sums
                    .execute([step.id])
                    .with_context(|| format!("Failed to clear sums of step {}", step.id))?;
                upsert_step
                    .execute(params![step.id, step.group_id, step.name, step.start, step.end])
                    .with_context(|| format!("Failed to write step {}", step.id))?;
            }

            let mut insert_sum = tx.prepare_cached(
                "INSERT INTO perf_category_sum (step_id, event_type, component_category, \
                 events, total_events) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for sum in sums {
                for category in ComponentCategory::ALL {
                    for kind in EventKind::ALL {
                        let events = sum.category_sum(category, kind);
                        let total = sum.category_total(category, kind);
                        if events == 0 && total == 0 {
                            continue;
                        }
                        insert_sum
                            .execute(params![
                                sum.step_id,
                                kind.as_str(),
                                category.as_str(),
                                events as i64,
                                total as i64,
                            ])
                            .with_context(|| {
                                format!("Failed to write {category} sum of step {}", sum.step_id)
                            })?;
                    }
                }
            }

            let mut insert_detail = tx.prepare_cached(
                "INSERT INTO perf_symbol_detail (step_id, event_type, pid, process_name, \
                 process_events, tid, thread_name, thread_events, file, file_events, symbol, \
                 symbol_events, symbol_total_events, component_category, component_name, \
                 sub_category_name, is_main_app, domain, sub_system, component) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20)",
            )?;
            for d in details {
                insert_detail
                    .execute(params![
                        d.step_id,
                        d.event_kind.as_str(),
                        d.process_id,
                        d.process_name,
                        d.process_events as i64,
                        d.thread_id,
                        d.thread_name,
                        d.thread_events as i64,
                        d.file,
                        d.file_events as i64,
                        d.symbol,
                        d.symbol_events as i64,
                        d.symbol_total_events as i64,
                        d.component_category.as_str(),
                        d.category_name,
                        d.sub_category_name,
                        d.is_main_app,
                        d.domain,
                        d.sub_system,
                        d.component,
                    ])
                    .with_context(|| {
                        format!(
                            "Failed to write detail for {}:{} in step {}",
                            d.file, d.symbol, d.step_id
                        )
                    })?;
            }
        }

        tx.commit().context("Failed to commit transaction")?;
        debug!(
            "Wrote {} steps, {} step sums and {} detail rows to {}",
            steps.len(),
            sums.len(),
            details.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Checkpoint the write-ahead log into the main database file.
    pub fn flush(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")
            .context("Failed to perform WAL checkpoint")?;
        info!("Store written to {}", self.path.display());
        Ok(())
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
