//! Rule-based classification of processes, threads, files and symbols.
//!
//! Classification never fails: every lookup ends in a default (`UNKNOWN`
//! for threads, `SYS_SDK` plus the base name for files, "other" for
//! processes).

mod file;
mod process;
mod symbol;
mod thread;

pub use file::{basename, classify_file, FileStrategy, FILE_PRECEDENCE};
pub use process::classify_process;
pub use symbol::{refine_symbol, split_destination, SymbolClassification};
pub use thread::{classify_thread, override_with_thread, thread_rule};

use crate::category::{Classification, FileClassification, ProcessClassification};
use crate::packages::PackageRegistry;
use crate::rules::RuleTables;

/// Immutable inputs shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    pub tables: &'a RuleTables,
    pub packages: &'a PackageRegistry,
    pub package_name: &'a str,
    pub scene: Option<&'a str>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        tables: &'a RuleTables,
        packages: &'a PackageRegistry,
        package_name: &'a str,
        scene: Option<&'a str>,
    ) -> Self {
        Self {
            tables,
            packages,
            package_name,
            scene,
        }
    }

    pub fn process(&self, process_name: &str) -> ProcessClassification {
        classify_process(self.tables, process_name, self.package_name, self.scene)
    }

    /// Thread classification plus the sub-category its rule names, if any.
    pub fn thread(&self, thread_name: Option<&str>) -> (Classification, Option<String>) {
        let rule_sub = thread_rule(self.tables, thread_name).and_then(|r| r.sub_category_name.clone());
        (classify_thread(self.tables, thread_name), rule_sub)
    }

    pub fn file(&self, path: &str, multiplatform_marker: bool) -> FileClassification {
        classify_file(self.tables, path, multiplatform_marker)
    }

    pub fn symbol(&self, raw_symbol: &str, file: &FileClassification) -> SymbolClassification {
        refine_symbol(self.tables, self.packages, raw_symbol, file)
    }

    pub fn split(&self, original_file: &str, raw_symbol: &str) -> Option<&'a str> {
        split_destination(self.tables, original_file, raw_symbol)
    }

    pub fn is_dfx(&self, raw_symbol: &str) -> bool {
        self.tables.dfx.matches(raw_symbol)
    }

    pub fn is_compute(&self, raw_file: &str, raw_symbol: &str) -> bool {
        self.tables.is_compute(raw_file, raw_symbol)
    }
}
