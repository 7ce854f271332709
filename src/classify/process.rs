use crate::category::ProcessClassification;
use crate::rules::{ProcessRule, RuleTables};

fn last_component(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn first_match(rules: &[ProcessRule], full: &str, short: &str) -> Option<ProcessClassification> {
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(full) || rule.pattern.is_match(short))
        .map(|rule| rule.classification.clone())
}

/// Classify a process by name.
///
/// Scene-keyed rules are consulted before the global table. Both the full
/// lower-cased name and its last path component are tried against every rule.
pub fn classify_process(
    tables: &RuleTables,
    process_name: &str,
    own_package_name: &str,
    scene_name: Option<&str>,
) -> ProcessClassification {
    let full = process_name.to_lowercase();
    let short = last_component(&full).to_string();

    if let Some(scene) = scene_name {
        for scene_rules in tables
            .scene_processes
            .iter()
            .filter(|s| s.scene.is_match(scene))
        {
            if let Some(found) = first_match(&scene_rules.rules, &full, &short) {
                return found;
            }
        }
    }

    if let Some(found) = first_match(&tables.processes, &full, &short) {
        return found;
    }

    if !own_package_name.is_empty() && process_name.starts_with(own_package_name) {
        return ProcessClassification::main_app(own_package_name);
    }

    ProcessClassification::other()
}
