//! Registry of known first- and third-party managed-code packages.
//!
//! Bytecode symbols name the package they were compiled from. When that
//! package is registered here, its category replaces the generic app
//! bytecode category. Entries come, in priority order, from the rule
//! configuration, the application's module manifest and its package-manager
//! dependency lists.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::category::{Classification, ComponentCategory};
use crate::config::PackageConfig;

#[derive(Debug, Default, Clone)]
pub struct PackageRegistry {
    entries: HashMap<String, Classification>,
}

impl PackageRegistry {
    pub fn from_config(packages: &[PackageConfig]) -> Self {
        let mut registry = Self::default();
        for package in packages {
            let sub = package
                .sub_category_name
                .clone()
                .unwrap_or_else(|| package.name.clone());
            registry.insert(&package.name, Classification::new(package.category, sub));
        }
        registry
    }

    /// Register a package unless it is already known.
    pub fn insert(&mut self, name: &str, classification: Classification) {
        self.entries
            .entry(name.to_string())
            .or_insert(classification);
    }

    pub fn get(&self, name: &str) -> Option<&Classification> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register the application's own modules as app bytecode.
    ///
    /// Accepts `{"module": {"name": ...}}` as well as
    /// `{"modules": [{"name": ...}, ...]}`.
    pub fn load_module_manifest(&mut self, path: &Path) -> Result<usize> {
        let manifest = read_json(path)?;
        let mut names = Vec::new();
        if let Some(name) = manifest.pointer("/module/name").and_then(Value::as_str) {
            names.push(name.to_string());
        }
        if let Some(modules) = manifest.get("modules").and_then(Value::as_array) {
            names.extend(
                modules
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .map(str::to_string),
            );
        }
        for name in &names {
            self.insert(name, Classification::new(ComponentCategory::AppAbc, name.clone()));
        }
        Ok(names.len())
    }

    /// Register declared dependencies as third-party packages.
    pub fn load_dependency_list(&mut self, path: &Path) -> Result<usize> {
        let manifest = read_json(path)?;
        let mut count = 0;
        for key in ["dependencies", "dynamicDependencies"] {
            if let Some(deps) = manifest.get(key).and_then(Value::as_object) {
                for name in deps.keys() {
                    self.insert(name, Classification::new(ComponentCategory::AppLib, name.clone()));
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let buf = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    serde_json::from_str(&buf).with_context(|| format!("Invalid manifest: {}", path.display()))
}
