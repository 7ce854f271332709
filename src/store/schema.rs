/// SQL schema of the attributed-load store
///
/// Three tables carry the data: `test_step` lists the analyzed steps,
/// `perf_symbol_detail` holds one row per (event kind, step, thread, file,
/// symbol) and `perf_category_sum` the per-step category self and inclusive
/// load. Event kinds and component categories are stored as their string
/// tags.

pub const SCHEMA_VERSION: i32 = 1;

/// SQL schema of the attributed-load store
pub const SCHEMA_SQL: &str = r#"
-- ============================================================================
-- SQLite Configuration
-- ============================================================================

PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

-- ============================================================================
-- Schema Version Tracking
-- ============================================================================

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    description TEXT
);

INSERT OR IGNORE INTO schema_version (version, description)
VALUES (1, 'Initial schema');

-- ============================================================================
-- Test Steps
-- ============================================================================

CREATE TABLE IF NOT EXISTS test_step (
    id INTEGER PRIMARY KEY,
    group_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL
);

-- ============================================================================
-- Attributed Load
-- ============================================================================

-- Self (symbol_events) and inclusive (symbol_total_events) load per symbol.
-- file/thread/process_events are the self load of the enclosing file,
-- thread and process within the same step and event kind.
CREATE TABLE IF NOT EXISTS perf_symbol_detail (
    id INTEGER PRIMARY KEY,
    step_id INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    pid INTEGER NOT NULL,
    process_name TEXT NOT NULL,
    process_events INTEGER NOT NULL,
    tid INTEGER NOT NULL,
    thread_name TEXT NOT NULL,
    thread_events INTEGER NOT NULL,
    file TEXT NOT NULL,
    file_events INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    symbol_events INTEGER NOT NULL,
    symbol_total_events INTEGER NOT NULL,
    component_category TEXT NOT NULL,
    component_name TEXT NOT NULL,
    sub_category_name TEXT NOT NULL,
    is_main_app INTEGER NOT NULL,
    domain TEXT NOT NULL,
    sub_system TEXT NOT NULL,
    component TEXT NOT NULL,
    UNIQUE(event_type, step_id, tid, file, symbol)
);

-- Per-step category matrices. total_events counts each sample at most once
-- per category, which SUM(symbol_total_events) over detail rows does not.
CREATE TABLE IF NOT EXISTS perf_category_sum (
    step_id INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    component_category TEXT NOT NULL,
    events INTEGER NOT NULL,
    total_events INTEGER NOT NULL,
    PRIMARY KEY (step_id, event_type, component_category)
);

CREATE INDEX IF NOT EXISTS idx_perf_symbol_detail_step ON perf_symbol_detail(step_id, event_type);
CREATE INDEX IF NOT EXISTS idx_perf_symbol_detail_file ON perf_symbol_detail(file);
CREATE INDEX IF NOT EXISTS idx_perf_symbol_detail_category ON perf_symbol_detail(component_category);
"#;

/// Create every table and index that does not exist yet.
pub fn create_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
