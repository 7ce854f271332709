use serde::Serialize;

use crate::aggregate::{PerfComponent, PerfSymbolDetail};
use crate::analyzer::PerfSum;
use crate::category::ComponentCategory;

/// Per-step entry of `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary<'a> {
    pub step_id: u32,
    pub step_name: &'a str,
    pub package_name: &'a str,
    /// Rows of the main application's processes.
    pub main_app: Vec<&'a PerfSymbolDetail>,
    /// Managed bytecode and third-party package components.
    pub libraries: Vec<&'a PerfComponent>,
}

/// Per-step entry of `digest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    pub step_id: u32,
    pub step_name: String,
    pub count: u64,
    pub app_count: u64,
}

fn is_library(component: &PerfComponent) -> bool {
    matches!(
        component.category,
        Some(ComponentCategory::AppAbc | ComponentCategory::AppLib)
    )
}

pub fn build_summary<'a>(sum: &'a PerfSum, package_name: &'a str) -> Vec<StepSummary<'a>> {
    sum.steps
        .iter()
        .map(|result| StepSummary {
            step_id: result.step.id,
            step_name: &result.step.name,
            package_name,
            main_app: result.details.iter().filter(|d| d.is_main_app).collect(),
            libraries: result.sum.components.iter().filter(|c| is_library(c)).collect(),
        })
        .collect()
}

pub fn build_digest(sum: &PerfSum) -> Vec<DigestEntry> {
    sum.steps
        .iter()
        .map(|result| DigestEntry {
            step_id: result.step.id,
            step_name: result.step.name.clone(),
            count: result.sum.count,
            app_count: result.sum.app_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PerfStepSum;
    use crate::analyzer::StepResult;
    use crate::trace::TestStep;

    fn component(name: &str, category: ComponentCategory, cycles: u64) -> PerfComponent {
        PerfComponent {
            name: name.to_string(),
            category: Some(category),
            cycles,
            total_cycles: cycles,
            ..Default::default()
        }
    }

    fn run() -> PerfSum {
        PerfSum {
            steps: vec![StepResult {
                step: TestStep {
                    id: 3,
                    group_id: 1,
                    name: "scroll".to_string(),
                    start: 0,
                    end: 10,
                },
                details: Vec::new(),
                sum: PerfStepSum {
                    step_id: 3,
                    components: vec![
                        component("libace.so", ComponentCategory::SysSdk, 50),
                        component("entry", ComponentCategory::AppAbc, 40),
                        component("@ohos/lottie", ComponentCategory::AppLib, 10),
                    ],
                    count: 120,
                    app_count: 90,
                    ..Default::default()
                },
            }],
        }
    }

    #[test]
    fn test_summary_keeps_library_components() {
        let sum = run();
        let summary = build_summary(&sum, "com.example.app");
        assert_eq!(summary.len(), 1);
        let names: Vec<_> = summary[0].libraries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "@ohos/lottie"]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json[0]["step_name"], "scroll");
        assert_eq!(json[0]["libraries"][1]["category"], "APP_LIB");
    }

    #[test]
    fn test_digest() {
        let digest = build_digest(&run());
        assert_eq!(
            digest,
            vec![DigestEntry {
                step_id: 3,
                step_name: "scroll".to_string(),
                count: 120,
                app_count: 90,
            }]
        );
    }
}
