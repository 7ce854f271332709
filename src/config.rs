//! Configuration for an analysis run.
//!
//! [`RuleConfig`] is the JSON rule set describing how processes, threads,
//! files and symbols map onto component categories. It is deserialized once
//! and compiled into [`crate::rules::RuleTables`]. [`AnalyzerConfig`] holds the
//! runtime options of one run, separated from CLI parsing.
//!
// The rule file looks like this (every section is optional):
//
// {
//   "processes": [
//     { "pattern": "^render_service$", "domain": "Graphic", "sub_system": "RS", "component": "render_service" }
//   ],
//   "scenes": [
//     { "scene": "^ResourceUsage_", "processes": [ ... ] }
//   ],
//   "threads": [
//     { "pattern": "^RSRenderThread", "category": "SYS_SDK", "category_name": "Render" }
//   ],
//   "files": {
//     "literals": [ { "pattern": "/system/lib64/libace.z.so", "category": "OS_Runtime" } ],
//     "patterns": [ { "pattern": "^/system/lib64/platformsdk/", "category": "SYS_SDK" } ],
//     "basenames": [ { "pattern": "libflutter.so", "category": "Flutter" } ]
//   },
//   "symbol_splits": [
//     { "source_file": "libark_jsruntime\\.so$", "symbols": ["^GC::"], "destination": "ArkGC" }
//   ],
//   "compute": [ { "file": "libc\\.so$", "symbol": "^mem(cpy|set)" } ],
//   "dfx": { "symbols": ["OHOS::HiviewDFX::Unwind"], "patterns": ["^HiTrace"] },
//   "packages": [ { "name": "@ohos/axios", "category": "APP_LIB" } ],
//   "multiplatform": { "modules": ["androidx.compose.ui"] }
// }

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::category::ComponentCategory;

/// Built-in rule set used when no `--rules` file is given.
pub const DEFAULT_RULES_JSON: &str = include_str!("../config/default_rules.json");

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub processes: Vec<ProcessRuleConfig>,
    #[serde(default)]
    pub scenes: Vec<SceneRuleConfig>,
    #[serde(default)]
    pub threads: Vec<ClassRuleConfig>,
    #[serde(default)]
    pub files: FileRulesConfig,
    #[serde(default)]
    pub symbol_splits: Vec<SymbolSplitConfig>,
    #[serde(default)]
    pub compute: Vec<ComputeRuleConfig>,
    #[serde(default)]
    pub dfx: DfxConfig,
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    #[serde(default)]
    pub multiplatform: MultiplatformConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProcessRuleConfig {
    pub pattern: String,
    pub domain: String,
    pub sub_system: String,
    pub component: String,
}

/// Process rules that only apply while the scene name matches `scene`.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SceneRuleConfig {
    pub scene: String,
    pub processes: Vec<ProcessRuleConfig>,
}

/// A thread or file rule. `pattern` is a regex, a full path or a base name
/// depending on the table the rule lives in.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ClassRuleConfig {
    pub pattern: String,
    pub category: ComponentCategory,
    pub category_name: Option<String>,
    pub sub_category_name: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileRulesConfig {
    #[serde(default)]
    pub literals: Vec<ClassRuleConfig>,
    #[serde(default)]
    pub patterns: Vec<ClassRuleConfig>,
    #[serde(default)]
    pub basenames: Vec<ClassRuleConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SymbolSplitConfig {
    pub source_file: String,
    pub symbols: Vec<String>,
    pub destination: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ComputeRuleConfig {
    pub file: String,
    pub symbol: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct DfxConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    pub category: ComponentCategory,
    pub sub_category_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct MultiplatformConfig {
    /// Package name of the cross-platform UI toolkit in bytecode symbols.
    #[serde(default = "default_ui_package")]
    pub ui_package: String,
    /// Library whose presence marks the trace as running multiplatform code.
    #[serde(default = "default_marker_library")]
    pub marker_library: String,
    /// Graphics libraries attributed to multiplatform code when the marker
    /// library is present.
    #[serde(default = "default_graphics_libraries")]
    pub graphics_libraries: Vec<String>,
    /// Declared module paths used to resolve mangled package names.
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default = "default_root_package")]
    pub root_package: String,
}

fn default_ui_package() -> String {
    "@kmp/compose-ui".to_string()
}

fn default_marker_library() -> String {
    "libkn.so".to_string()
}

fn default_graphics_libraries() -> Vec<String> {
    vec!["libskia_canvaskit.z.so".to_string(), "libGLESv3.so".to_string()]
}

fn default_root_package() -> String {
    "kotlin".to_string()
}

impl Default for MultiplatformConfig {
    fn default() -> Self {
        Self {
            ui_package: default_ui_package(),
            marker_library: default_marker_library(),
            graphics_libraries: default_graphics_libraries(),
            modules: Vec::new(),
            root_package: default_root_package(),
        }
    }
}

impl RuleConfig {
    pub fn from_json(buf: &str) -> Result<Self> {
        let config: RuleConfig =
            serde_json::from_str(buf).context("Failed to parse rule configuration")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let buf = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file: {}", path.display()))?;
        Self::from_json(&buf).with_context(|| format!("Invalid rule file: {}", path.display()))
    }

    /// The rule set compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_RULES_JSON)
    }
}

/// Runtime options for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    pub verbosity: u8,
    /// Trace databases, one per step group, in run order
    pub traces: Vec<PathBuf>,
    /// Package name of the analyzed application
    pub package_name: String,
    /// Active test scene, used to select scene-keyed process rules
    pub scene: Option<String>,
    /// Rule file (built-in rules when unset)
    pub rules: Option<PathBuf>,
    /// Module manifest used to seed the package registry
    pub module_manifest: Option<PathBuf>,
    /// Package-manager dependency lists used to seed the package registry
    pub dependency_lists: Vec<PathBuf>,
    /// Directory receiving the CSV export and JSON summaries
    pub output_dir: Option<PathBuf>,
    /// Store database to write attributed rows into
    pub store: Option<PathBuf>,
    /// Merge into an existing store instead of replacing it
    pub merge_store: bool,
    /// Number of step groups processed in parallel
    pub workers: usize,
    /// Process id used by step boundary markers in the trace
    pub marker_pid: i64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            verbosity: 0,
            traces: Vec::new(),
            package_name: String::new(),
            scene: None,
            rules: None,
            module_manifest: None,
            dependency_lists: Vec::new(),
            output_dir: None,
            store: None,
            merge_store: false,
            workers: 1,
            marker_pid: crate::trace::STEP_MARKER_PID,
        }
    }
}

impl AnalyzerConfig {
    pub fn load_rules(&self) -> Result<RuleConfig> {
        match &self.rules {
            Some(path) => RuleConfig::load(path),
            None => RuleConfig::builtin(),
        }
    }
}
