//! Precompiled rule tables.
//!
//! [`RuleTables`] is built once from a [`RuleConfig`] and is immutable
//! afterwards. Every table preserves configuration order, which is also its
//! match priority: the first rule that matches a subject wins.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::category::{Classification, ComponentCategory, ProcessClassification};
use crate::config::{ClassRuleConfig, ProcessRuleConfig, RuleConfig};

/// Classification carried by a thread or file rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub category: ComponentCategory,
    pub category_name: String,
    /// `None` means the caller keeps (or derives) its own sub-category.
    pub sub_category_name: Option<String>,
}

impl RuleTarget {
    fn from_config(rule: &ClassRuleConfig) -> Self {
        Self {
            category: rule.category,
            category_name: rule
                .category_name
                .clone()
                .unwrap_or_else(|| rule.category.as_str().to_string()),
            sub_category_name: rule.sub_category_name.clone(),
        }
    }

    /// Build a classification, falling back to `default_sub` when the rule
    /// does not name a sub-category.
    pub fn classification(&self, default_sub: &str) -> Classification {
        Classification {
            category: self.category,
            category_name: self.category_name.clone(),
            sub_category_name: self
                .sub_category_name
                .clone()
                .unwrap_or_else(|| default_sub.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct PatternRule {
    pub pattern: Regex,
    pub target: RuleTarget,
}

#[derive(Debug)]
pub struct ProcessRule {
    pub pattern: Regex,
    pub classification: ProcessClassification,
}

#[derive(Debug)]
pub struct SceneRules {
    pub scene: Regex,
    pub rules: Vec<ProcessRule>,
}

/// Carves matching symbols of a shared file out into their own bucket.
#[derive(Debug)]
pub struct SplitRule {
    pub source_file: Regex,
    pub symbols: Vec<Regex>,
    pub destination: String,
}

impl SplitRule {
    pub fn matches(&self, file: &str, symbol: &str) -> bool {
        self.source_file.is_match(file) && self.symbols.iter().any(|re| re.is_match(symbol))
    }
}

#[derive(Debug)]
pub struct ComputeRule {
    pub file: Regex,
    pub symbol: Regex,
}

#[derive(Debug, Default)]
pub struct FileRules {
    pub literals: HashMap<String, RuleTarget>,
    pub patterns: Vec<PatternRule>,
    pub basenames: HashMap<String, RuleTarget>,
}

#[derive(Debug, Default)]
pub struct DfxRules {
    pub symbols: HashSet<String>,
    pub patterns: Vec<Regex>,
}

impl DfxRules {
    pub fn matches(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol) || self.patterns.iter().any(|re| re.is_match(symbol))
    }
}

#[derive(Debug)]
pub struct MultiplatformRules {
    pub ui_package: String,
    pub marker_library: String,
    pub graphics_libraries: HashSet<String>,
    pub modules: Vec<String>,
    pub root_package: String,
}

#[derive(Debug)]
pub struct RuleTables {
    pub scene_processes: Vec<SceneRules>,
    pub processes: Vec<ProcessRule>,
    pub threads: Vec<PatternRule>,
    pub files: FileRules,
    pub splits: Vec<SplitRule>,
    pub compute: Vec<ComputeRule>,
    pub dfx: DfxRules,
    pub multiplatform: MultiplatformRules,
}

fn compile(pattern: &str, what: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid {what} pattern: {pattern}"))
}

fn compile_process_rules(rules: &[ProcessRuleConfig]) -> Result<Vec<ProcessRule>> {
    rules
        .iter()
        .map(|rule| {
            Ok(ProcessRule {
                pattern: compile(&rule.pattern, "process")?,
                classification: ProcessClassification {
                    is_main_app: false,
                    domain: rule.domain.clone(),
                    sub_system: rule.sub_system.clone(),
                    component: rule.component.clone(),
                },
            })
        })
        .collect()
}

fn compile_pattern_rules(rules: &[ClassRuleConfig], what: &str) -> Result<Vec<PatternRule>> {
    rules
        .iter()
        .map(|rule| {
            Ok(PatternRule {
                pattern: compile(&rule.pattern, what)?,
                target: RuleTarget::from_config(rule),
            })
        })
        .collect()
}

fn literal_table(rules: &[ClassRuleConfig]) -> HashMap<String, RuleTarget> {
    let mut table = HashMap::new();
    for rule in rules {
        // Earlier entries keep priority over later duplicates.
        table
            .entry(rule.pattern.clone())
            .or_insert_with(|| RuleTarget::from_config(rule));
    }
    table
}

impl RuleTables {
    pub fn compile(config: &RuleConfig) -> Result<Self> {
        let scene_processes = config
            .scenes
            .iter()
            .map(|scene| {
                Ok(SceneRules {
                    scene: compile(&scene.scene, "scene")?,
                    rules: compile_process_rules(&scene.processes)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let splits = config
            .symbol_splits
            .iter()
            .map(|split| {
                Ok(SplitRule {
                    source_file: compile(&split.source_file, "split source file")?,
                    symbols: split
                        .symbols
                        .iter()
                        .map(|s| compile(s, "split symbol"))
                        .collect::<Result<Vec<_>>>()?,
                    destination: split.destination.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let compute = config
            .compute
            .iter()
            .map(|rule| {
                Ok(ComputeRule {
                    file: compile(&rule.file, "compute file")?,
                    symbol: compile(&rule.symbol, "compute symbol")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dfx = DfxRules {
            symbols: config.dfx.symbols.iter().cloned().collect(),
            patterns: config
                .dfx
                .patterns
                .iter()
                .map(|p| compile(p, "dfx symbol"))
                .collect::<Result<Vec<_>>>()?,
        };

        let mp = &config.multiplatform;
        Ok(Self {
            scene_processes,
            processes: compile_process_rules(&config.processes)?,
            threads: compile_pattern_rules(&config.threads, "thread")?,
            files: FileRules {
                literals: literal_table(&config.files.literals),
                patterns: compile_pattern_rules(&config.files.patterns, "file")?,
                basenames: literal_table(&config.files.basenames),
            },
            splits,
            compute,
            dfx,
            multiplatform: MultiplatformRules {
                ui_package: mp.ui_package.clone(),
                marker_library: mp.marker_library.clone(),
                graphics_libraries: mp.graphics_libraries.iter().cloned().collect(),
                modules: mp.modules.clone(),
                root_package: mp.root_package.clone(),
            },
        })
    }

    /// Whether a frame is generic computation per the compute pairs.
    pub fn is_compute(&self, file: &str, symbol: &str) -> bool {
        self.compute
            .iter()
            .any(|rule| rule.file.is_match(file) && rule.symbol.is_match(symbol))
    }
}
