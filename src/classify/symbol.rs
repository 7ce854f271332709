use crate::category::{Classification, ComponentCategory, FileClassification};
use crate::packages::PackageRegistry;
use crate::rules::RuleTables;
use crate::symbols::{BytecodeSymbol, MangledSymbol};

/// Display symbol plus the file classification it refines to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolClassification {
    pub symbol: String,
    pub file: FileClassification,
}

/// Refine a file classification using the symbol's own structure.
///
/// Only app bytecode and multiplatform files are refined; any other file, or
/// a symbol that does not follow the expected grammar, passes through.
pub fn refine_symbol(
    tables: &RuleTables,
    packages: &PackageRegistry,
    raw_symbol: &str,
    file: &FileClassification,
) -> SymbolClassification {
    match file.classification.category {
        ComponentCategory::AppAbc => {
            if let Some(parsed) = BytecodeSymbol::parse(raw_symbol) {
                let mut refined = file.clone();
                refined.file = parsed.logical_file();
                if parsed.package_name == tables.multiplatform.ui_package {
                    refined.classification =
                        Classification::new(ComponentCategory::Kmp, parsed.package_name.clone());
                } else if let Some(entry) = packages.get(&parsed.package_name) {
                    refined.classification = entry.clone();
                } else {
                    refined.classification.sub_category_name = parsed.package_name.clone();
                }
                return SymbolClassification {
                    symbol: parsed.function_name,
                    file: refined,
                };
            }
        }
        ComponentCategory::Kmp => {
            let mp = &tables.multiplatform;
            if let Some(parsed) = MangledSymbol::parse(raw_symbol, &mp.modules, &mp.root_package) {
                let mut refined = file.clone();
                refined.file = parsed.package.clone();
                refined.classification.sub_category_name = parsed.package;
                return SymbolClassification {
                    symbol: parsed.full_name,
                    file: refined,
                };
            }
        }
        _ => {}
    }
    SymbolClassification {
        symbol: raw_symbol.to_string(),
        file: file.clone(),
    }
}

/// Destination bucket of the first split rule matching the original file and
/// raw symbol.
pub fn split_destination<'a>(
    tables: &'a RuleTables,
    original_file: &str,
    raw_symbol: &str,
) -> Option<&'a str> {
    tables
        .splits
        .iter()
        .find(|rule| rule.matches(original_file, raw_symbol))
        .map(|rule| rule.destination.as_str())
}
