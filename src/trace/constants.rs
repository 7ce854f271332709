//! Shared constants for trace processing.

use std::sync::LazyLock;

use regex::Regex;

/// Process id under which step boundary markers are recorded.
pub const STEP_MARKER_PID: i64 = -1;

pub const SAMPLE_TABLE: &str = "perf_sample";
pub const EVENT_TYPE_TABLE: &str = "perf_event_type";
pub const CALLCHAIN_TABLE: &str = "perf_callchain";
pub const THREAD_TABLE: &str = "perf_thread";
pub const FILE_TABLE: &str = "perf_files";
pub const DICT_TABLE: &str = "data_dict";
pub const MARKER_TABLE: &str = "step_marker";

/// Tables a trace must carry to be analyzable. The marker table is optional.
pub const REQUIRED_TABLES: [&str; 6] = [
    SAMPLE_TABLE,
    EVENT_TYPE_TABLE,
    CALLCHAIN_TABLE,
    THREAD_TABLE,
    FILE_TABLE,
    DICT_TABLE,
];

/// Static regex for step boundary marker names. Compiled once at first use.
/// Pattern: step_start:{id}:{name} or step_end:{id}
pub static STEP_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^step_(start|end):(\d+)(?::(.*))?$").expect("Invalid step marker regex pattern")
});
