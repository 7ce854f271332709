//! loadscope library: component load attribution for sampled CPU traces.
//!
//! A perf trace database is read step by step. Every sampled call stack is
//! classified frame by frame against rule tables and the application's
//! package registry, one frame is chosen to own the sample's "self" load and
//! one frame per further category receives "total" load. The results are
//! folded into per-step detail rows and sums that can be written to a SQLite
//! store, a CSV export and JSON summaries.
//!
//! # Modules
//!
//! - [`trace`] - Trace database reader and test step derivation
//! - [`rules`] - Compiled classification rule tables
//! - [`classify`] - Process, thread, file and symbol classification
//! - [`callchain`] - Self/total attribution of call stacks
//! - [`aggregate`] - Per-step detail rows and sums
//! - [`store`] - SQLite store of attributed load
//! - [`analyzer`] - End-to-end pipeline
//!
//! # Example
//!
//! ```no_run
//! use loadscope::{Analyzer, AnalyzerConfig};
//! use std::path::PathBuf;
//!
//! let config = AnalyzerConfig {
//!     traces: vec![PathBuf::from("perf.db")],
//!     package_name: "com.example.app".to_string(),
//!     store: Some(PathBuf::from("load.db")),
//!     ..Default::default()
//! };
//! let sum = Analyzer::new(config)?.run()?;
//! for result in &sum.steps {
//!     println!("{}: {} events", result.step.name, result.sum.count);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod aggregate;
pub mod analyzer;
pub mod callchain;
pub mod category;
pub mod classify;
pub mod config;
pub mod context;
pub mod output;
pub mod packages;
pub mod rules;
pub mod store;
pub mod symbols;
pub mod trace;

pub use aggregate::{PerfComponent, PerfStepSum, PerfSymbolDetail};
pub use analyzer::{Analyzer, PerfSum, StepResult};
pub use category::{ComponentCategory, EventKind};
pub use config::{AnalyzerConfig, RuleConfig};
pub use store::PerfStore;
