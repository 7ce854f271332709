//! Common test utilities for loadscope integration tests.
#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP: &str = "com.example.app";
pub const ENTRY_SO: &str = "/data/storage/el1/bundle/libs/arm64/libentry.so";
pub const ACE_SO: &str = "/system/lib64/libace.so";

pub const CYCLES: i64 = 1;
pub const INSTRUCTIONS: i64 = 2;
pub const SCHED_SWITCH: i64 = 3;

/// Builds a synthetic perf trace database.
pub struct TraceBuilder {
    conn: Connection,
    path: PathBuf,
    next_sample_id: i64,
}

impl TraceBuilder {
    pub fn new(path: &Path) -> Self {
        let conn = Connection::open(path).expect("Failed to create trace database");
        conn.execute_batch(
            "CREATE TABLE perf_sample (id INTEGER PRIMARY KEY, callchain_id INTEGER, \
                 thread_id INTEGER, event_count INTEGER, cpu_id INTEGER, \
                 event_type_id INTEGER, timestamp INTEGER);
             CREATE TABLE perf_event_type (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE perf_callchain (callchain_id INTEGER, depth INTEGER, \
                 file_id INTEGER, symbol_id INTEGER);
             CREATE TABLE perf_thread (thread_id INTEGER PRIMARY KEY, process_id INTEGER, \
                 thread_name TEXT);
             CREATE TABLE perf_files (file_id INTEGER PRIMARY KEY, path TEXT);
             CREATE TABLE data_dict (id INTEGER PRIMARY KEY, data TEXT);
             CREATE TABLE step_marker (ts INTEGER, pid INTEGER, name TEXT);
             INSERT INTO perf_event_type VALUES (1, 'hw-cpu-cycles'), (2, 'hw-instructions'), \
                 (3, 'sched:sched_switch');",
        )
        .expect("Failed to create trace schema");
        Self {
            conn,
            path: path.to_path_buf(),
            next_sample_id: 1,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn thread(&mut self, tid: i64, pid: i64, name: &str) -> &mut Self {
        self.conn
            .execute("INSERT INTO perf_thread VALUES (?1, ?2, ?3)", params![tid, pid, name])
            .unwrap();
        self
    }

    pub fn file(&mut self, id: i64, path: &str) -> &mut Self {
        self.conn
            .execute("INSERT INTO perf_files VALUES (?1, ?2)", params![id, path])
            .unwrap();
        self
    }

    pub fn symbol(&mut self, id: i64, name: &str) -> &mut Self {
        self.conn
            .execute("INSERT INTO data_dict VALUES (?1, ?2)", params![id, name])
            .unwrap();
        self
    }

    /// Frames are `(file_id, symbol_id)`, leaf first.
    pub fn callchain(&mut self, id: i64, frames: &[(i64, i64)]) -> &mut Self {
        for (depth, (file_id, symbol_id)) in frames.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO perf_callchain VALUES (?1, ?2, ?3, ?4)",
                    params![id, depth as i64, file_id, symbol_id],
                )
                .unwrap();
        }
        self
    }

    pub fn sample(&mut self, callchain_id: i64, tid: i64, count: i64, event_type: i64, ts: i64) -> &mut Self {
        self.conn
            .execute(
                "INSERT INTO perf_sample VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                params![self.next_sample_id, callchain_id, tid, count, event_type, ts],
            )
            .unwrap();
        self.next_sample_id += 1;
        self
    }

    pub fn marker(&mut self, ts: i64, name: &str) -> &mut Self {
        self.conn
            .execute("INSERT INTO step_marker VALUES (?1, -1, ?2)", params![ts, name])
            .unwrap();
        self
    }
}

/// Rules used by the pipeline tests.
pub const RULES_JSON: &str = r#"
{
    "processes": [
        { "pattern": "^render_service$", "domain": "Graphic", "sub_system": "Render", "component": "render_service" }
    ],
    "threads": [
        { "pattern": "^RSRenderThread", "category": "OS_Runtime", "category_name": "RenderThread" }
    ],
    "compute": [ { "file": "libc\\.so$", "symbol": "^memcpy$" } ],
    "dfx": { "symbols": ["GetBacktrace"] }
}
"#;

pub fn write_rules(dir: &Path) -> PathBuf {
    let path = dir.join("rules.json");
    fs::write(&path, RULES_JSON).unwrap();
    path
}

/// Dictionaries and call stacks shared by the synthetic traces.
///
/// - callchain 1: `decode` (app native) <- `onPageShow` (app bytecode)
/// - callchain 2: `FlushLayout` (system library)
/// - callchain 3: `GetBacktrace` (diagnostic) <- `decode`
/// - callchain 4: `memcpy` (pure compute) <- `decode`
/// - callchain 5: `decode` again, the same symbol id inside the system library
pub fn populate_dictionaries(trace: &mut TraceBuilder) {
    trace
        .thread(100, 100, APP)
        .thread(101, 100, "RSRenderThread")
        .thread(200, 200, "render_service")
        .file(1, ENTRY_SO)
        .file(2, ACE_SO)
        .file(3, "/data/storage/el1/bundle/entry/ets/modules.abc")
        .file(4, "/system/lib64/libdfx.so")
        .file(5, "/system/lib64/libc.so")
        .symbol(10, "decode")
        .symbol(11, "FlushLayout")
        .symbol(12, "onPageShow:[url:entry|entry|1.0.0|src/main/ets/Index.ets:3:1]")
        .symbol(13, "GetBacktrace")
        .symbol(14, "memcpy")
        .callchain(1, &[(1, 10), (3, 12)])
        .callchain(2, &[(2, 11)])
        .callchain(3, &[(4, 13), (1, 10)])
        .callchain(4, &[(5, 14), (1, 10)])
        .callchain(5, &[(2, 10)]);
}

/// Two marker-delimited steps.
///
/// Step "launch" (1000..=2000): 300 app and 200 system cycles plus 500
/// swapper cycles, so every retained cycle counts twice; 1000 app
/// instructions.
///
/// Step "scroll" (3000..=4000): 100 cycles on the render thread of the app
/// and 50 cycles under a diagnostic leaf.
pub fn two_step_trace(dir: &Path) -> PathBuf {
    let mut trace = TraceBuilder::new(&dir.join("two_step.db"));
    populate_dictionaries(&mut trace);
    trace
        .marker(1000, "step_start:1:launch")
        .marker(2000, "step_end:1")
        .marker(3000, "step_start:2:scroll")
        .marker(4000, "step_end:2")
        .sample(1, 100, 300, CYCLES, 1100)
        .sample(2, 200, 200, CYCLES, 1200)
        .sample(2, 0, 500, CYCLES, 1300)
        .sample(1, 100, 1000, INSTRUCTIONS, 1400)
        .sample(2, 100, 999, SCHED_SWITCH, 1500)
        .sample(2, 100, 777, CYCLES, 2500)
        .sample(1, 101, 100, CYCLES, 3100)
        .sample(3, 100, 50, CYCLES, 3200);
    trace.path().to_path_buf()
}

/// A trace without markers: one step spanning all samples.
pub fn unmarked_trace(dir: &Path) -> PathBuf {
    let mut trace = TraceBuilder::new(&dir.join("unmarked.db"));
    populate_dictionaries(&mut trace);
    trace
        .sample(4, 100, 40, CYCLES, 10)
        .sample(2, 200, 60, CYCLES, 20);
    trace.path().to_path_buf()
}

/// One step where the `decode` symbol id is sampled in the app library first
/// and in a system library afterwards.
pub fn shared_symbol_trace(dir: &Path) -> PathBuf {
    let mut trace = TraceBuilder::new(&dir.join("shared_symbol.db"));
    populate_dictionaries(&mut trace);
    trace
        .sample(1, 100, 300, CYCLES, 10)
        .sample(5, 100, 200, CYCLES, 20);
    trace.path().to_path_buf()
}

/// Two steps sharing the boundary timestamp 2000, with one sample on it.
pub fn adjacent_steps_trace(dir: &Path) -> PathBuf {
    let mut trace = TraceBuilder::new(&dir.join("adjacent.db"));
    populate_dictionaries(&mut trace);
    trace
        .marker(1000, "step_start:1:launch")
        .marker(2000, "step_end:1")
        .marker(2000, "step_start:2:scroll")
        .marker(3000, "step_end:2")
        .sample(2, 200, 40, CYCLES, 1500)
        .sample(1, 100, 300, CYCLES, 2000);
    trace.path().to_path_buf()
}
