//! Read-side queries over the attributed-load store.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Row};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::PerfStore;
use crate::category::{ComponentCategory, EventKind};
use crate::trace::TestStep;

/// Step selection for ranking queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFilter {
    All,
    Step(u32),
}

impl fmt::Display for StepFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Step(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for StepFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match s.parse::<u32>() {
            Ok(id) => Ok(Self::Step(id)),
            Err(_) => bail!("Invalid step: {s}. Must be a step id or 'all'"),
        }
    }
}

impl StepFilter {
    fn step_id(&self) -> Option<u32> {
        match self {
            Self::All => None,
            Self::Step(id) => Some(*id),
        }
    }
}

/// Rows that render as a text table.
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub step_id: u32,
    pub category: ComponentCategory,
    pub events: u64,
    pub total_events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepLoad {
    pub step_id: u32,
    pub name: String,
    pub events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLoad {
    pub file: String,
    pub category: ComponentCategory,
    pub sub_category_name: String,
    pub events: u64,
    pub total_events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolLoad {
    pub symbol: String,
    pub thread_name: String,
    pub events: u64,
    pub total_events: u64,
}

impl Tabular for CategoryTotal {
    fn headers() -> &'static [&'static str] {
        &["step", "category", "events", "total_events"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.step_id.to_string(),
            self.category.to_string(),
            self.events.to_string(),
            self.total_events.to_string(),
        ]
    }
}

impl Tabular for StepLoad {
    fn headers() -> &'static [&'static str] {
        &["step", "name", "instructions"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.step_id.to_string(), self.name.clone(), self.events.to_string()]
    }
}

impl Tabular for FileLoad {
    fn headers() -> &'static [&'static str] {
        &["file", "category", "sub_category", "events", "total_events"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.file.clone(),
            self.category.to_string(),
            self.sub_category_name.clone(),
            self.events.to_string(),
            self.total_events.to_string(),
        ]
    }
}

impl Tabular for SymbolLoad {
    fn headers() -> &'static [&'static str] {
        &["symbol", "thread", "events", "total_events"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.clone(),
            self.thread_name.clone(),
            self.events.to_string(),
            self.total_events.to_string(),
        ]
    }
}

impl Tabular for TestStep {
    fn headers() -> &'static [&'static str] {
        &["id", "group", "name", "start", "end"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.group_id.to_string(),
            self.name.clone(),
            self.start.to_string(),
            self.end.to_string(),
        ]
    }
}

fn category_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ComponentCategory> {
    let tag: String = row.get(idx)?;
    Ok(tag.parse().unwrap_or(ComponentCategory::Unknown))
}

fn events_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let events: Option<i64> = row.get(idx)?;
    Ok(events.unwrap_or(0).max(0) as u64)
}

fn file_load(row: &Row<'_>) -> rusqlite::Result<FileLoad> {
    Ok(FileLoad {
        file: row.get(0)?,
        category: category_column(row, 1)?,
        sub_category_name: row.get(2)?,
        events: events_column(row, 3)?,
        total_events: events_column(row, 4)?,
    })
}

impl PerfStore {
    /// Self and inclusive load per category, grouped by step.
    ///
    /// Read from the stored category matrices: inclusive load counts a
    /// sample once per category even when several of its frames share one.
    pub fn category_totals(&self, kind: EventKind) -> Result<Vec<CategoryTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT step_id, component_category, events, total_events \
             FROM perf_category_sum WHERE event_type = ?1 \
             ORDER BY step_id, events DESC, component_category",
        )?;
        let rows = stmt
            .query_map([kind.as_str()], |row| {
                Ok(CategoryTotal {
                    step_id: row.get(0)?,
                    category: category_column(row, 1)?,
                    events: events_column(row, 2)?,
                    total_events: events_column(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query category totals")?;
        Ok(rows)
    }

    /// Steps ranked by their instruction count.
    pub fn steps_by_instructions(&self) -> Result<Vec<StepLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name, COALESCE(SUM(d.symbol_events), 0) AS events \
             FROM test_step s \
             LEFT JOIN perf_symbol_detail d ON d.step_id = s.id AND d.event_type = ?1 \
             GROUP BY s.id, s.name \
             ORDER BY events DESC, s.id",
        )?;
        let rows = stmt
            .query_map([EventKind::Instructions.as_str()], |row| {
                Ok(StepLoad {
                    step_id: row.get(0)?,
                    name: row.get(1)?,
                    events: events_column(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query steps")?;
        Ok(rows)
    }

    /// Files ranked by self load within one step or across all steps.
    pub fn top_files(&self, step: StepFilter, kind: EventKind, limit: usize) -> Result<Vec<FileLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT file, component_category, sub_category_name, \
             SUM(symbol_events) AS events, SUM(symbol_total_events) \
             FROM perf_symbol_detail \
             WHERE event_type = ?1 AND (?2 IS NULL OR step_id = ?2) \
             GROUP BY file, component_category, sub_category_name \
             ORDER BY events DESC, file \
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), step.step_id(), limit as i64], file_load)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query files")?;
        Ok(rows)
    }

    /// Symbols of one file ranked by self load within a step.
    pub fn top_symbols(
        &self,
        step_id: u32,
        file: &str,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<SymbolLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, thread_name, SUM(symbol_events) AS events, SUM(symbol_total_events) \
             FROM perf_symbol_detail \
             WHERE event_type = ?1 AND step_id = ?2 AND file = ?3 \
             GROUP BY symbol, thread_name \
             ORDER BY events DESC, symbol \
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), step_id, file, limit as i64], |row| {
                Ok(SymbolLoad {
                    symbol: row.get(0)?,
                    thread_name: row.get(1)?,
                    events: events_column(row, 2)?,
                    total_events: events_column(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query symbols")?;
        Ok(rows)
    }

    /// Files attributed to one category.
    pub fn category_files(
        &self,
        category: ComponentCategory,
        step: StepFilter,
        kind: EventKind,
    ) -> Result<Vec<FileLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT file, component_category, sub_category_name, \
             SUM(symbol_events) AS events, SUM(symbol_total_events) \
             FROM perf_symbol_detail \
             WHERE event_type = ?1 AND component_category = ?2 AND (?3 IS NULL OR step_id = ?3) \
             GROUP BY file, component_category, sub_category_name \
             ORDER BY events DESC, file",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), category.as_str(), step.step_id()], file_load)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query category files")?;
        Ok(rows)
    }

    pub fn test_steps(&self) -> Result<Vec<TestStep>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, group_id, name, start_ts, end_ts FROM test_step ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TestStep {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    name: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query test steps")?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{PerfStepSum, PerfSymbolDetail};
    use tempfile::TempDir;

    fn detail(
        step_id: u32,
        kind: EventKind,
        category: ComponentCategory,
        file: &str,
        symbol: &str,
        events: u64,
    ) -> PerfSymbolDetail {
        PerfSymbolDetail {
            step_id,
            event_kind: kind,
            process_id: 100,
            process_name: "com.example.app".to_string(),
            process_events: 0,
            thread_id: 100,
            thread_name: "main".to_string(),
            thread_events: 0,
            file: file.to_string(),
            file_events: 0,
            symbol: symbol.to_string(),
            symbol_events: events,
            symbol_total_events: events * 2,
            component_category: category,
            category_name: category.as_str().to_string(),
            sub_category_name: file.to_string(),
            is_main_app: true,
            domain: "APP".to_string(),
            sub_system: "com.example.app".to_string(),
            component: "com.example.app".to_string(),
        }
    }

    fn sum(step_id: u32, entries: &[(ComponentCategory, EventKind, u64, u64)]) -> PerfStepSum {
        let mut sum = PerfStepSum {
            step_id,
            ..Default::default()
        };
        for &(category, kind, events, total) in entries {
            sum.categories_sum[category.index()][kind.index()] = events;
            sum.categories_total[category.index()][kind.index()] = total;
        }
        sum
    }

    fn store(dir: &TempDir) -> PerfStore {
        use ComponentCategory::*;
        use EventKind::*;

        let mut store = PerfStore::create(&dir.path().join("store.db")).unwrap();
        let steps = [
            TestStep { id: 1, group_id: 1, name: "launch".to_string(), start: 0, end: 10 },
            TestStep { id: 2, group_id: 1, name: "scroll".to_string(), start: 10, end: 20 },
            TestStep { id: 3, group_id: 2, name: "idle".to_string(), start: 0, end: 5 },
        ];
        let details = [
            detail(1, Cycles, AppSo, "libentry.so", "decode", 50),
            detail(1, Cycles, AppSo, "libentry.so", "draw", 30),
            detail(1, Cycles, SysSdk, "libace.so", "Flush", 40),
            detail(1, Instructions, AppSo, "libentry.so", "decode", 100),
            detail(2, Cycles, SysSdk, "libace.so", "Flush", 90),
            detail(2, Instructions, SysSdk, "libace.so", "Flush", 300),
        ];
        // Inclusive totals are smaller than the summed detail rows: frames of
        // one sample that share a category are counted once.
        let sums = [
            sum(
                1,
                &[
                    (AppSo, Cycles, 80, 120),
                    (SysSdk, Cycles, 40, 80),
                    (AppSo, Instructions, 100, 100),
                ],
            ),
            sum(2, &[(SysSdk, Cycles, 90, 90), (SysSdk, Instructions, 300, 300)]),
            sum(3, &[]),
        ];
        store.write(&steps, &sums, &details).unwrap();
        store
    }

    #[test]
    fn test_step_filter_parse() {
        assert_eq!("all".parse::<StepFilter>().unwrap(), StepFilter::All);
        assert_eq!("ALL".parse::<StepFilter>().unwrap(), StepFilter::All);
        assert_eq!("3".parse::<StepFilter>().unwrap(), StepFilter::Step(3));
        assert!("x".parse::<StepFilter>().is_err());
        assert_eq!(StepFilter::Step(2).to_string(), "2");
    }

    #[test]
    fn test_category_totals() {
        let dir = TempDir::new().unwrap();
        let totals = store(&dir).category_totals(EventKind::Cycles).unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].step_id, 1);
        assert_eq!(totals[0].category, ComponentCategory::AppSo);
        assert_eq!(totals[0].events, 80);
        assert_eq!(totals[0].total_events, 120);
        assert_eq!(totals[1].category, ComponentCategory::SysSdk);
        assert_eq!(totals[1].total_events, 80);
        assert_eq!(totals[2].step_id, 2);
        assert_eq!(totals[2].events, 90);
        assert_eq!(totals[2].total_events, 90);
        assert!(totals.iter().all(|t| t.step_id != 3));
    }

    #[test]
    fn test_steps_by_instructions() {
        let dir = TempDir::new().unwrap();
        let steps = store(&dir).steps_by_instructions().unwrap();
        let order: Vec<_> = steps.iter().map(|s| (s.step_id, s.events)).collect();
        assert_eq!(order, vec![(2, 300), (1, 100), (3, 0)]);
    }

    #[test]
    fn test_top_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let all = store.top_files(StepFilter::All, EventKind::Cycles, 10).unwrap();
        assert_eq!(all[0].file, "libace.so");
        assert_eq!(all[0].events, 130);

        let step1 = store.top_files(StepFilter::Step(1), EventKind::Cycles, 1).unwrap();
        assert_eq!(step1.len(), 1);
        assert_eq!(step1[0].file, "libentry.so");
        assert_eq!(step1[0].events, 80);

        assert!(store
            .top_files(StepFilter::Step(9), EventKind::Cycles, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_symbols_and_category_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let symbols = store
            .top_symbols(1, "libentry.so", EventKind::Cycles, 10)
            .unwrap();
        let names: Vec<_> = symbols.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(names, vec!["decode", "draw"]);

        let files = store
            .category_files(ComponentCategory::SysSdk, StepFilter::All, EventKind::Cycles)
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].events, 130);
        assert!(store
            .category_files(ComponentCategory::Kmp, StepFilter::All, EventKind::Cycles)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_test_steps() {
        let dir = TempDir::new().unwrap();
        let steps = store(&dir).test_steps().unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].name, "scroll");
        assert_eq!((steps[1].start, steps[1].end), (10, 20));
    }
}
