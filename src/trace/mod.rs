//! Trace input: the embedded relational trace file produced by the sampler.
//!
//! # Module Organization
//!
//! - [`models`]: record structs for the trace tables
//! - [`reader`]: [`TraceDb`], the read-only SQLite trace connection
//! - [`steps`]: test step derivation from boundary markers
//! - [`constants`]: table names and the marker grammar

pub mod constants;
pub mod models;
pub mod reader;
pub mod steps;

pub use constants::STEP_MARKER_PID;
pub use models::*;
pub use reader::{TraceDb, TraceDictionary};
pub use steps::derive_steps;
