use regex::Regex;
use std::sync::LazyLock;

use crate::category::{Classification, ComponentCategory, FileClassification, OriginKind};
use crate::rules::{RuleTables, RuleTarget};

/// Per-process application data directory holding the installed bundle.
static APP_BUNDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(/proc/\d+/root)?/data/storage/el[1-4]/bundle/")
        .expect("Invalid app bundle regex pattern")
});

/// OS components shipped as applications, laid out like an app bundle.
const OS_COMPONENT_APP_DIRS: [&str; 2] = ["/system/app/SceneBoard/", "/system/app/com.ohos.launcher/"];

pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// One layer of the file classification precedence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStrategy {
    /// Exact match of the full path.
    Literal,
    /// First matching path regex.
    Pattern,
    /// Application bundle directory layout.
    Bundle,
    /// Exact match of the base name.
    Basename,
}

/// Evaluation order of the file strategies. The default `SYS_SDK`
/// classification applies when none of them matches.
pub const FILE_PRECEDENCE: [FileStrategy; 4] = [
    FileStrategy::Literal,
    FileStrategy::Pattern,
    FileStrategy::Bundle,
    FileStrategy::Basename,
];

fn from_target(path: &str, target: &RuleTarget, origin: OriginKind) -> FileClassification {
    FileClassification {
        file: path.to_string(),
        classification: target.classification(basename(path)),
        origin_kind: Some(origin),
    }
}

fn is_bundle_path(path: &str) -> bool {
    APP_BUNDLE_RE.is_match(path) || OS_COMPONENT_APP_DIRS.iter().any(|dir| path.starts_with(dir))
}

impl FileStrategy {
    pub fn classify(self, tables: &RuleTables, path: &str) -> Option<FileClassification> {
        match self {
            Self::Literal => tables
                .files
                .literals
                .get(path)
                .map(|target| from_target(path, target, OriginKind::Literal)),
            Self::Pattern => tables
                .files
                .patterns
                .iter()
                .find(|rule| rule.pattern.is_match(path))
                .map(|rule| from_target(path, &rule.target, OriginKind::Pattern)),
            Self::Bundle => {
                if !is_bundle_path(path) {
                    return None;
                }
                let native = path.ends_with(".so") || path.contains("/libs/") || path.contains("/lib/");
                let category = if native {
                    ComponentCategory::AppSo
                } else {
                    ComponentCategory::AppAbc
                };
                Some(FileClassification {
                    file: path.to_string(),
                    classification: Classification::new(category, basename(path)),
                    origin_kind: Some(OriginKind::Bundle),
                })
            }
            Self::Basename => tables
                .files
                .basenames
                .get(basename(path))
                .map(|target| from_target(path, target, OriginKind::Basename)),
        }
    }
}

/// Classify a binary or source file by path.
///
/// `multiplatform_marker` tells whether the multiplatform marker library was
/// seen anywhere in the trace; it moves the configured graphics libraries
/// from app native code into the multiplatform category.
pub fn classify_file(tables: &RuleTables, path: &str, multiplatform_marker: bool) -> FileClassification {
    let mut result = FILE_PRECEDENCE
        .iter()
        .find_map(|strategy| strategy.classify(tables, path))
        .unwrap_or_else(|| FileClassification {
            file: path.to_string(),
            classification: Classification::new(ComponentCategory::SysSdk, basename(path)),
            origin_kind: Some(OriginKind::Default),
        });

    if multiplatform_marker
        && result.classification.category == ComponentCategory::AppSo
        && tables
            .multiplatform
            .graphics_libraries
            .contains(basename(path))
    {
        result.classification.category = ComponentCategory::Kmp;
        result.classification.category_name = ComponentCategory::Kmp.as_str().to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;

    fn tables() -> RuleTables {
        let json = r#"
        {
            "files": {
                "literals": [
                    { "pattern": "/system/lib64/libark_jsruntime.so", "category": "OS_Runtime", "sub_category_name": "ArkRuntime" }
                ],
                "patterns": [
                    { "pattern": "/libflutter\\.so$", "category": "Flutter" },
                    { "pattern": "^/system/lib64/", "category": "SYS_SDK" }
                ],
                "basenames": [
                    { "pattern": "libc++_shared.so", "category": "SYS_SDK", "sub_category_name": "libc++" },
                    { "pattern": "libark_jsruntime.so", "category": "APP_LIB" }
                ]
            },
            "multiplatform": { "graphics_libraries": ["libskia.so"] }
        }
        "#;
        RuleTables::compile(&RuleConfig::from_json(json).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_beats_pattern() {
        let c = classify_file(&tables(), "/system/lib64/libark_jsruntime.so", false);
        assert_eq!(c.classification.category, ComponentCategory::OsRuntime);
        assert_eq!(c.classification.sub_category_name, "ArkRuntime");
        assert_eq!(c.origin_kind, Some(OriginKind::Literal));
    }

    #[test]
    fn test_pattern_beats_bundle() {
        let c = classify_file(
            &tables(),
            "/data/storage/el1/bundle/libs/arm64/libflutter.so",
            false,
        );
        assert_eq!(c.classification.category, ComponentCategory::Flutter);
        assert_eq!(c.classification.sub_category_name, "libflutter.so");
        assert_eq!(c.origin_kind, Some(OriginKind::Pattern));
    }

    #[test]
    fn test_bundle_native_and_bytecode() {
        let t = tables();
        let so = classify_file(&t, "/data/storage/el1/bundle/libs/arm64/libentry.so", false);
        assert_eq!(so.classification.category, ComponentCategory::AppSo);
        assert_eq!(so.origin_kind, Some(OriginKind::Bundle));

        let abc = classify_file(&t, "/proc/1234/root/data/storage/el1/bundle/entry/ets/modules.abc", false);
        assert_eq!(abc.classification.category, ComponentCategory::AppAbc);
        assert_eq!(abc.classification.sub_category_name, "modules.abc");

        let os_app = classify_file(&t, "/system/app/SceneBoard/ets/modules.abc", false);
        assert_eq!(os_app.classification.category, ComponentCategory::AppAbc);
    }

    #[test]
    fn test_basename_match() {
        let c = classify_file(&tables(), "/vendor/lib64/libc++_shared.so", false);
        assert_eq!(c.classification.sub_category_name, "libc++");
        assert_eq!(c.origin_kind, Some(OriginKind::Basename));
    }

    #[test]
    fn test_default_sys_sdk() {
        let c = classify_file(&tables(), "/chip/lib/libgpu.so", false);
        assert_eq!(c.classification.category, ComponentCategory::SysSdk);
        assert_eq!(c.classification.sub_category_name, "libgpu.so");
        assert_eq!(c.origin_kind, Some(OriginKind::Default));
        assert_eq!(c.file, "/chip/lib/libgpu.so");
    }

    #[test]
    fn test_graphics_override_requires_marker() {
        let t = tables();
        let path = "/data/storage/el1/bundle/libs/arm64/libskia.so";
        let without = classify_file(&t, path, false);
        assert_eq!(without.classification.category, ComponentCategory::AppSo);
        let with = classify_file(&t, path, true);
        assert_eq!(with.classification.category, ComponentCategory::Kmp);
        assert_eq!(with.classification.category_name, "KMP");

        // Only app native code is moved.
        let system = classify_file(&t, "/chip/lib/libskia.so", true);
        assert_eq!(system.classification.category, ComponentCategory::SysSdk);
    }
}
