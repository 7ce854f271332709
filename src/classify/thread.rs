use crate::category::Classification;
use crate::rules::{RuleTables, RuleTarget};

/// Find the first thread rule matching `thread_name`.
pub fn thread_rule<'a>(tables: &'a RuleTables, thread_name: Option<&str>) -> Option<&'a RuleTarget> {
    let name = thread_name?;
    tables
        .threads
        .iter()
        .find(|rule| rule.pattern.is_match(name))
        .map(|rule| &rule.target)
}

/// Classify a thread by name, or unknown when nothing matches.
pub fn classify_thread(tables: &RuleTables, thread_name: Option<&str>) -> Classification {
    match thread_rule(tables, thread_name) {
        Some(target) => target.classification(thread_name.unwrap_or_default()),
        None => Classification::unknown(),
    }
}

/// Apply a thread classification on top of a file-derived one.
///
/// A known thread classification replaces the category and category name;
/// the file-derived sub-category survives unless the thread rule names one.
pub fn override_with_thread(
    file_classification: &Classification,
    thread: &Classification,
    thread_rule_sub: Option<&str>,
) -> Classification {
    if thread.is_unknown() {
        return file_classification.clone();
    }
    Classification {
        category: thread.category,
        category_name: thread.category_name.clone(),
        sub_category_name: thread_rule_sub
            .map(str::to_string)
            .unwrap_or_else(|| file_classification.sub_category_name.clone()),
    }
}
