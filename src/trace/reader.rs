use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::constants::*;
use super::models::{CallchainFrameRecord, MarkerRecord, Sample, ThreadRecord};
use crate::category::EventKind;
use crate::classify::basename;

/// String dictionaries and call stacks of one trace.
///
/// This is raw trace data, not classification state: it is loaded once per
/// trace and shared read-only by the steps of that trace.
#[derive(Debug, Default, Clone)]
pub struct TraceDictionary {
    pub files: HashMap<i64, String>,
    pub symbols: HashMap<i64, String>,
    pub threads: HashMap<i64, ThreadRecord>,
    /// Frames per callchain id, leaf first.
    pub callchains: HashMap<i64, Vec<CallchainFrameRecord>>,
}

impl TraceDictionary {
    pub fn file_path(&self, file_id: i64) -> &str {
        self.files.get(&file_id).map_or("[unknown]", String::as_str)
    }

    pub fn symbol(&self, symbol_id: i64) -> &str {
        self.symbols.get(&symbol_id).map_or("[unknown]", String::as_str)
    }

    /// Name of the process owning `process_id`, i.e. the name of its main thread.
    pub fn process_name(&self, process_id: i64) -> Option<&str> {
        self.threads.get(&process_id).and_then(|t| t.name.as_deref())
    }

    /// Whether any file in the trace has the given base name.
    pub fn has_library(&self, library: &str) -> bool {
        self.files.values().any(|path| basename(path) == library)
    }
}

/// Read-only connection to a trace database.
pub struct TraceDb {
    conn: Connection,
    path: PathBuf,
}

impl TraceDb {
    /// Open a trace database and verify it carries the required tables.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Trace database not found: {}", path.display());
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open trace database: {}", path.display()))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        for table in REQUIRED_TABLES {
            if !db.table_exists(table)? {
                bail!(
                    "Trace database {} is missing required table {table}. Is this a perf trace?",
                    path.display()
                );
            }
        }
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// First and last sample timestamps, `None` for a trace without samples.
    pub fn sample_time_range(&self) -> Result<Option<(i64, i64)>> {
        let range: (Option<i64>, Option<i64>) = self
            .conn
            .query_row(
                &format!("SELECT MIN(timestamp), MAX(timestamp) FROM {SAMPLE_TABLE}"),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Failed to query sample time range")?;
        Ok(match range {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    /// Step boundary markers recorded under `marker_pid`, ordered by time.
    pub fn markers(&self, marker_pid: i64) -> Result<Vec<MarkerRecord>> {
        if !self.table_exists(MARKER_TABLE)? {
            debug!("{} has no {MARKER_TABLE} table", self.path.display());
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT ts, pid, name FROM {MARKER_TABLE} WHERE pid = ?1 ORDER BY ts"
            ))
            .context("Failed to prepare marker query")?;
        let markers = stmt
            .query_map([marker_pid], |row| {
                Ok(MarkerRecord {
                    ts: row.get(0)?,
                    pid: row.get(1)?,
                    name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .context("Failed to query markers")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect markers")?;
        Ok(markers)
    }

    /// Load the file, symbol and thread dictionaries and every call stack.
    pub fn load_dictionary(&self) -> Result<TraceDictionary> {
        let mut dict = TraceDictionary::default();

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT file_id, path FROM {FILE_TABLE}"))
            .context("Failed to prepare file query")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let path: Option<String> = row.get(1)?;
            dict.files.insert(id, path.unwrap_or_default());
        }
        drop(rows);
        drop(stmt);

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, data FROM {DICT_TABLE}"))
            .context("Failed to prepare symbol dictionary query")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let data: Option<String> = row.get(1)?;
            dict.symbols.insert(id, data.unwrap_or_default());
        }
        drop(rows);
        drop(stmt);

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT thread_id, process_id, thread_name FROM {THREAD_TABLE}"
            ))
            .context("Failed to prepare thread query")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let record = ThreadRecord {
                thread_id: row.get(0)?,
                process_id: row.get(1)?,
                name: row.get(2)?,
            };
            dict.threads.insert(record.thread_id, record);
        }
        drop(rows);
        drop(stmt);

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT callchain_id, depth, file_id, symbol_id FROM {CALLCHAIN_TABLE} \
                 ORDER BY callchain_id, depth"
            ))
            .context("Failed to prepare callchain query")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let frame = CallchainFrameRecord {
                callchain_id: row.get(0)?,
                depth: row.get(1)?,
                file_id: row.get(2)?,
                symbol_id: row.get(3)?,
            };
            dict.callchains
                .entry(frame.callchain_id)
                .or_default()
                .push(frame);
        }

        debug!(
            "Loaded {} files, {} symbols, {} threads, {} callchains from {}",
            dict.files.len(),
            dict.symbols.len(),
            dict.threads.len(),
            dict.callchains.len(),
            self.path.display()
        );
        Ok(dict)
    }

    /// Map event type ids to event kinds, dropping counters outside the
    /// cycle/instruction allow-list.
    fn event_kinds(&self) -> Result<HashMap<i64, EventKind>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {EVENT_TYPE_TABLE}"))
            .context("Failed to prepare event type query")?;
        let mut rows = stmt.query([])?;
        let mut kinds = HashMap::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            match EventKind::from_label(&name) {
                Some(kind) => {
                    kinds.insert(id, kind);
                }
                None => debug!("Ignoring event type {name}"),
            }
        }
        Ok(kinds)
    }

    /// Cycle and instruction samples with `start <= timestamp <= end`.
    pub fn samples(&self, start: i64, end: i64) -> Result<Vec<Sample>> {
        let kinds = self.event_kinds()?;
        if kinds.is_empty() {
            warn!(
                "{} has no cycle or instruction events",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT callchain_id, thread_id, event_count, cpu_id, event_type_id, timestamp \
                 FROM {SAMPLE_TABLE} WHERE timestamp >= ?1 AND timestamp <= ?2 \
                 ORDER BY timestamp, id"
            ))
            .context("Failed to prepare sample query")?;
        let mut rows = stmt.query([start, end])?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next()? {
            let event_type_id: i64 = row.get(4)?;
            let Some(kind) = kinds.get(&event_type_id) else {
                continue;
            };
            let event_count: i64 = row.get(2)?;
            samples.push(Sample {
                callchain_id: row.get::<_, Option<i64>>(0)?.unwrap_or(-1),
                thread_id: row.get(1)?,
                event_count: event_count.max(0) as u64,
                cpu_id: row.get::<_, Option<i32>>(3)?.unwrap_or(-1),
                event_kind: *kind,
                timestamp: row.get(5)?,
            });
        }
        Ok(samples)
    }
}
