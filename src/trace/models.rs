//! Trace data model structs.
//!
//! These mirror the rows of the trace tables after dictionary ids are kept
//! as-is; strings are resolved lazily through [`super::TraceDictionary`].

use serde::{Deserialize, Serialize};

use crate::category::EventKind;

/// One sampled event: the atomic unit of load.
///
/// # Fields
/// - `callchain_id`: deduplicated call stack (references `perf_callchain`)
/// - `thread_id`: sampled thread; 0 is the idle (swapper) thread
/// - `event_count`: raw counter delta attributed to this sample
/// - `cpu_id`: CPU the sample was taken on
/// - `event_kind`: cycles or instructions
/// - `timestamp`: sample time in nanoseconds (trace clock)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub callchain_id: i64,
    pub thread_id: i64,
    pub event_count: u64,
    pub cpu_id: i32,
    pub event_kind: EventKind,
    pub timestamp: i64,
}

/// Thread information extracted from the trace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ThreadRecord {
    pub thread_id: i64,
    pub process_id: i64,
    pub name: Option<String>,
}

/// One frame of a deduplicated call stack. Depth 0 is the leaf.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallchainFrameRecord {
    pub callchain_id: i64,
    pub depth: u32,
    pub file_id: i64,
    pub symbol_id: i64,
}

/// A step boundary marker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerRecord {
    pub ts: i64,
    pub pid: i64,
    pub name: String,
}

/// A time window of one step group's trace analyzed as one test step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    pub id: u32,
    pub group_id: u32,
    pub name: String,
    pub start: i64,
    pub end: i64,
}

impl TestStep {
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }
}
