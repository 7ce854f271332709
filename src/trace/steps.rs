use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use super::constants::STEP_MARKER_RE;
use super::models::{MarkerRecord, TestStep};

#[derive(Default)]
struct MarkerRange {
    name: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
}

/// Derive the test steps of one step group.
///
/// Steps come from `step_start`/`step_end` marker pairs, keyed by the marker
/// id and ordered by it. Both window ends are inclusive, except that a step
/// ending exactly where another starts stops one tick earlier. Without usable markers the whole sample time range
/// is one step, and without samples a single unbounded step is returned.
/// Step ids are assigned sequentially starting at `first_id`.
pub fn derive_steps(
    markers: &[MarkerRecord],
    time_range: Option<(i64, i64)>,
    group_id: u32,
    first_id: u32,
) -> Vec<TestStep> {
    let (trace_start, trace_end) = time_range.unwrap_or((i64::MIN, i64::MAX));

    let mut ranges: BTreeMap<u32, MarkerRange> = BTreeMap::new();
    for marker in markers {
        let Some(caps) = STEP_MARKER_RE.captures(&marker.name) else {
            warn!("Ignoring malformed step marker {:?}", marker.name);
            continue;
        };
        let Ok(marker_id) = caps[2].parse::<u32>() else {
            continue;
        };
        let range = ranges.entry(marker_id).or_default();
        match &caps[1] {
            "start" => {
                range.start = Some(marker.ts);
                if let Some(name) = caps.get(3) {
                    range.name = Some(name.as_str().to_string());
                }
            }
            _ => range.end = Some(marker.ts),
        }
    }

    let mut steps: Vec<TestStep> = ranges
        .into_values()
        .filter(|range| range.start.is_some() || range.end.is_some())
        .enumerate()
        .map(|(i, range)| {
            let id = first_id + i as u32;
            TestStep {
                id,
                group_id,
                name: range
                    .name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("step{id}")),
                start: range.start.unwrap_or(trace_start),
                end: range.end.unwrap_or(trace_end),
            }
        })
        .collect();

    // Windows are inclusive; a shared boundary timestamp belongs to the step
    // that starts there.
    let starts: HashSet<i64> = steps.iter().map(|step| step.start).collect();
    for step in &mut steps {
        if step.end > step.start && starts.contains(&step.end) {
            step.end -= 1;
        }
    }

    if steps.is_empty() {
        steps.push(TestStep {
            id: first_id,
            group_id,
            name: format!("step{first_id}"),
            start: trace_start,
            end: trace_end,
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(ts: i64, name: &str) -> MarkerRecord {
        MarkerRecord {
            ts,
            pid: -1,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_marker_steps() {
        let markers = vec![
            marker(100, "step_start:1:launch"),
            marker(200, "step_end:1"),
            marker(300, "step_start:2:scroll"),
            marker(400, "step_end:2"),
        ];
        let steps = derive_steps(&markers, Some((0, 1000)), 3, 5);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].id, 5);
        assert_eq!(steps[0].group_id, 3);
        assert_eq!(steps[0].name, "launch");
        assert_eq!((steps[0].start, steps[0].end), (100, 200));
        assert_eq!(steps[1].id, 6);
        assert_eq!(steps[1].name, "scroll");
    }

    #[test]
    fn test_shared_boundary_belongs_to_later_step() {
        let markers = vec![
            marker(100, "step_start:1:launch"),
            marker(200, "step_end:1"),
            marker(200, "step_start:2:scroll"),
            marker(300, "step_end:2"),
        ];
        let steps = derive_steps(&markers, Some((0, 1000)), 1, 1);
        assert_eq!((steps[0].start, steps[0].end), (100, 199));
        assert_eq!((steps[1].start, steps[1].end), (200, 300));
        assert!(!steps[0].contains(200));
        assert!(steps[1].contains(200));
    }

    #[test]
    fn test_unterminated_marker_uses_trace_end() {
        let markers = vec![marker(100, "step_start:1")];
        let steps = derive_steps(&markers, Some((0, 1000)), 1, 1);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "step1");
        assert_eq!((steps[0].start, steps[0].end), (100, 1000));
    }

    #[test]
    fn test_fallback_to_time_range() {
        let markers = vec![marker(5, "something else")];
        let steps = derive_steps(&markers, Some((10, 20)), 1, 1);
        assert_eq!(steps.len(), 1);
        assert_eq!((steps[0].start, steps[0].end), (10, 20));
    }

    #[test]
    fn test_fallback_to_unbounded_step() {
        let steps = derive_steps(&[], None, 2, 4);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, 4);
        assert_eq!(steps[0].name, "step4");
        assert_eq!((steps[0].start, steps[0].end), (i64::MIN, i64::MAX));
    }
}
