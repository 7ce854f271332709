//! SQLite store of attributed load.
//!
//! The store keeps the detail rows and test steps of one or more runs so
//! that they can be ranked and compared after the fact.
pub mod query;
pub mod schema;
pub mod writer;

pub use query::{
    CategoryTotal, FileLoad, StepFilter, StepLoad, SymbolLoad, Tabular,
};
pub use schema::{create_schema, SCHEMA_SQL, SCHEMA_VERSION};
pub use writer::PerfStore;
