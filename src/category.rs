//! Component categories, event kinds and classification records.
//!
//! Every sampled event ends up attributed to exactly one [`ComponentCategory`].
//! The dense [`ComponentCategory::index`] and [`EventKind::index`] values are
//! used to address the `[category][event_kind]` sum matrices.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical subsystem a frame is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentCategory {
    /// Application managed bytecode.
    #[serde(rename = "APP_ABC")]
    AppAbc,
    /// Application native code.
    #[serde(rename = "APP_SO")]
    AppSo,
    /// Third-party SDKs and packages bundled with the application.
    #[serde(rename = "APP_LIB")]
    AppLib,
    /// Language runtime internals.
    #[serde(rename = "OS_Runtime")]
    OsRuntime,
    /// System libraries.
    #[serde(rename = "SYS_SDK")]
    SysSdk,
    #[serde(rename = "RN")]
    Rn,
    #[serde(rename = "Flutter")]
    Flutter,
    #[serde(rename = "WEB")]
    Web,
    /// Managed-multiplatform code (compiled or toolkit driven).
    #[serde(rename = "KMP")]
    Kmp,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

/// Number of categories, i.e. the row count of the category matrices.
pub const CATEGORY_COUNT: usize = 10;

impl ComponentCategory {
    pub const ALL: [ComponentCategory; CATEGORY_COUNT] = [
        Self::AppAbc,
        Self::AppSo,
        Self::AppLib,
        Self::OsRuntime,
        Self::SysSdk,
        Self::Rn,
        Self::Flutter,
        Self::Web,
        Self::Kmp,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppAbc => "APP_ABC",
            Self::AppSo => "APP_SO",
            Self::AppLib => "APP_LIB",
            Self::OsRuntime => "OS_Runtime",
            Self::SysSdk => "SYS_SDK",
            Self::Rn => "RN",
            Self::Flutter => "Flutter",
            Self::Web => "WEB",
            Self::Kmp => "KMP",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::AppAbc => 0,
            Self::AppSo => 1,
            Self::AppLib => 2,
            Self::OsRuntime => 3,
            Self::SysSdk => 4,
            Self::Rn => 5,
            Self::Flutter => 6,
            Self::Web => 7,
            Self::Kmp => 8,
            Self::Unknown => 9,
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::ALL.iter().find(|c| c.as_str().eq_ignore_ascii_case(s)) {
            Some(c) => Ok(*c),
            None => bail!(
                "Invalid category: {s}. Must be one of: {}",
                Self::ALL.map(|c| c.as_str()).join(", ")
            ),
        }
    }
}

/// Hardware counter an event was sampled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Cycles,
    Instructions,
}

pub const EVENT_KIND_COUNT: usize = 2;

const CYCLE_LABELS: &[&str] = &["hw-cpu-cycles", "cpu-cycles", "raw-cpu-cycles"];
const INSTRUCTION_LABELS: &[&str] = &["hw-instructions", "instructions", "raw-instruction-retired"];

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [Self::Cycles, Self::Instructions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cycles => "cycles",
            Self::Instructions => "instructions",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Cycles => 0,
            Self::Instructions => 1,
        }
    }

    /// Map a raw counter label from the trace to an event kind.
    ///
    /// Only the fixed allow-list of cycle and instruction counters is
    /// accepted; every other counter is ignored by the analysis.
    pub fn from_label(label: &str) -> Option<Self> {
        if CYCLE_LABELS.contains(&label) {
            Some(Self::Cycles)
        } else if INSTRUCTION_LABELS.contains(&label) {
            Some(Self::Instructions)
        } else {
            None
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cycles" => Ok(Self::Cycles),
            "instructions" => Ok(Self::Instructions),
            _ => bail!("Invalid event kind: {s}. Must be one of: cycles, instructions"),
        }
    }
}

/// Category plus display names produced by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    pub category: ComponentCategory,
    pub category_name: String,
    pub sub_category_name: String,
}

impl Classification {
    pub fn new(category: ComponentCategory, sub_category_name: impl Into<String>) -> Self {
        Self {
            category,
            category_name: category.as_str().to_string(),
            sub_category_name: sub_category_name.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(ComponentCategory::Unknown, "unknown")
    }

    pub fn is_unknown(&self) -> bool {
        self.category == ComponentCategory::Unknown
    }
}

/// Classification of a process, derived once per process name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessClassification {
    pub is_main_app: bool,
    pub domain: String,
    pub sub_system: String,
    pub component: String,
}

impl ProcessClassification {
    pub fn main_app(package_name: &str) -> Self {
        Self {
            is_main_app: true,
            domain: "APP".to_string(),
            sub_system: package_name.to_string(),
            component: package_name.to_string(),
        }
    }

    pub fn other() -> Self {
        Self {
            is_main_app: false,
            domain: "other".to_string(),
            sub_system: "unknown".to_string(),
            component: "unknown".to_string(),
        }
    }
}

/// Which precedence layer of the file classifier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Literal,
    Pattern,
    Bundle,
    Basename,
    Default,
}

/// Classification of one binary or source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileClassification {
    /// Logical file name used as the accounting key.
    pub file: String,
    pub classification: Classification,
    pub origin_kind: Option<OriginKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for c in ComponentCategory::ALL {
            let parsed: ComponentCategory = c.as_str().parse().unwrap();
            assert_eq!(c, parsed);
        }
    }

    #[test]
    fn test_category_indices_dense() {
        for (i, c) in ComponentCategory::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&ComponentCategory::OsRuntime).unwrap();
        assert_eq!(json, "\"OS_Runtime\"");
        let parsed: ComponentCategory = serde_json::from_str("\"APP_SO\"").unwrap();
        assert_eq!(parsed, ComponentCategory::AppSo);
    }

    #[test]
    fn test_category_invalid() {
        let result: Result<ComponentCategory> = "NOPE".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_event_kind_from_label() {
        assert_eq!(EventKind::from_label("hw-cpu-cycles"), Some(EventKind::Cycles));
        assert_eq!(EventKind::from_label("raw-cpu-cycles"), Some(EventKind::Cycles));
        assert_eq!(
            EventKind::from_label("hw-instructions"),
            Some(EventKind::Instructions)
        );
        assert_eq!(EventKind::from_label("sched:sched_switch"), None);
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::Cycles.to_string(), "cycles");
        assert_eq!("instructions".parse::<EventKind>().unwrap(), EventKind::Instructions);
        assert!("cache-misses".parse::<EventKind>().is_err());
    }
}
