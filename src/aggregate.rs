//! Per-step folding of attributed samples into detail rows and sums.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::callchain::{Attribution, Frame};
use crate::category::{
    Classification, ComponentCategory, EventKind, CATEGORY_COUNT, EVENT_KIND_COUNT,
};
use crate::classify::override_with_thread;
use crate::context::{StepContext, Thread};
use crate::trace::Sample;

/// Thread id of the per-CPU idle task.
pub const SWAPPER_THREAD_ID: i64 = 0;

pub type CategoryMatrix = [[u64; EVENT_KIND_COUNT]; CATEGORY_COUNT];

/// Factor that spreads idle-task events over the remaining samples.
pub fn redistribution_scale(total: u64, swapper: u64) -> f64 {
    if total <= swapper {
        return 1.0;
    }
    1.0 + swapper as f64 / (total - swapper) as f64
}

pub fn scaled_weight(event_count: u64, scale: f64) -> u64 {
    (event_count as f64 * scale).round() as u64
}

/// Load of one symbol of one file on one thread within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfSymbolDetail {
    pub step_id: u32,
    pub event_kind: EventKind,
    pub process_id: i64,
    pub process_name: String,
    pub process_events: u64,
    pub thread_id: i64,
    pub thread_name: String,
    pub thread_events: u64,
    pub file: String,
    pub file_events: u64,
    pub symbol: String,
    pub symbol_events: u64,
    pub symbol_total_events: u64,
    pub component_category: ComponentCategory,
    pub category_name: String,
    pub sub_category_name: String,
    pub is_main_app: bool,
    pub domain: String,
    pub sub_system: String,
    pub component: String,
}

impl PerfSymbolDetail {
    fn new(step_id: u32, kind: EventKind, thread: &Thread, frame: &Frame, cls: Classification) -> Self {
        let process = &thread.system_classification;
        Self {
            step_id,
            event_kind: kind,
            process_id: thread.process_id,
            process_name: thread.process_name.clone(),
            process_events: 0,
            thread_id: thread.thread_id,
            thread_name: thread.name.clone(),
            thread_events: 0,
            file: frame.file.clone(),
            file_events: 0,
            symbol: frame.symbol.clone(),
            symbol_events: 0,
            symbol_total_events: 0,
            component_category: cls.category,
            category_name: cls.category_name,
            sub_category_name: cls.sub_category_name,
            is_main_app: process.is_main_app,
            domain: process.domain.clone(),
            sub_system: process.sub_system.clone(),
            component: process.component.clone(),
        }
    }
}

/// Self and total load of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfComponent {
    pub name: String,
    pub category: Option<ComponentCategory>,
    pub cycles: u64,
    pub total_cycles: u64,
    pub instructions: u64,
    pub total_instructions: u64,
}

impl PerfComponent {
    fn add_self(&mut self, kind: EventKind, weight: u64) {
        match kind {
            EventKind::Cycles => self.cycles += weight,
            EventKind::Instructions => self.instructions += weight,
        }
    }

    fn add_total(&mut self, kind: EventKind, weight: u64) {
        match kind {
            EventKind::Cycles => self.total_cycles += weight,
            EventKind::Instructions => self.total_instructions += weight,
        }
    }
}

/// Per-step totals.
///
/// `total` and `skipped` hold redistributed weights of retained samples;
/// `categories_sum` is self load and `categories_total` inclusive load
/// counted at most once per category per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfStepSum {
    pub step_id: u32,
    pub components: Vec<PerfComponent>,
    pub categories_sum: CategoryMatrix,
    pub categories_total: CategoryMatrix,
    pub total: [u64; EVENT_KIND_COUNT],
    pub skipped: [u64; EVENT_KIND_COUNT],
    pub count: u64,
    pub app_count: u64,
}

impl PerfStepSum {
    pub fn category_sum(&self, category: ComponentCategory, kind: EventKind) -> u64 {
        self.categories_sum[category.index()][kind.index()]
    }

    pub fn category_total(&self, category: ComponentCategory, kind: EventKind) -> u64 {
        self.categories_total[category.index()][kind.index()]
    }

    pub fn attributed(&self, kind: EventKind) -> u64 {
        self.categories_sum.iter().map(|row| row[kind.index()]).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DetailKey {
    kind: EventKind,
    thread_id: i64,
    file: String,
    symbol: String,
}

impl DetailKey {
    fn new(kind: EventKind, thread_id: i64, frame: &Frame) -> Self {
        Self {
            kind,
            thread_id,
            file: frame.file.clone(),
            symbol: frame.symbol.clone(),
        }
    }
}

/// Folds the samples of one step.
pub struct StepAggregator<'p> {
    step_id: u32,
    package_name: &'p str,
    scales: [f64; EVENT_KIND_COUNT],
    details: HashMap<DetailKey, PerfSymbolDetail>,
    components: HashMap<(ComponentCategory, String), PerfComponent>,
    sum: PerfStepSum,
}

impl<'p> StepAggregator<'p> {
    /// Prepare aggregation of `samples`, deriving the per-kind swapper
    /// redistribution scale from them.
    pub fn new(step_id: u32, package_name: &'p str, samples: &[Sample]) -> Self {
        let mut totals = [0u64; EVENT_KIND_COUNT];
        let mut swapper = [0u64; EVENT_KIND_COUNT];
        for sample in samples {
            let k = sample.event_kind.index();
            totals[k] += sample.event_count;
            if sample.thread_id == SWAPPER_THREAD_ID {
                swapper[k] += sample.event_count;
            }
        }
        let scales = std::array::from_fn(|k| redistribution_scale(totals[k], swapper[k]));

        Self {
            step_id,
            package_name,
            scales,
            details: HashMap::new(),
            components: HashMap::new(),
            sum: PerfStepSum {
                step_id,
                ..Default::default()
            },
        }
    }

    pub fn scale(&self, kind: EventKind) -> f64 {
        self.scales[kind.index()]
    }

    pub fn add(&mut self, ctx: &mut StepContext<'_>, sample: &Sample) {
        if sample.thread_id == SWAPPER_THREAD_ID {
            return;
        }
        let kind = sample.event_kind;
        let k = kind.index();
        let weight = scaled_weight(sample.event_count, self.scales[k]);

        let (thread, attribution) = ctx.resolve(sample.thread_id, sample.callchain_id);

        self.sum.total[k] += weight;
        self.sum.count += weight;
        if !self.package_name.is_empty() && thread.process_name.contains(self.package_name) {
            self.sum.app_count += weight;
        }

        let chain = match attribution {
            Attribution::Skipped => {
                self.sum.skipped[k] += weight;
                return;
            }
            Attribution::Attributed(chain) => chain,
        };

        let self_frame = chain.self_frame();
        let self_cls = self.frame_classification(thread, self_frame);
        let self_category = self_cls.category;
        let self_component = (self_category, self_cls.sub_category_name.clone());

        let self_key = DetailKey::new(kind, thread.thread_id, self_frame);
        let row = self
            .details
            .entry(self_key.clone())
            .or_insert_with(|| PerfSymbolDetail::new(self.step_id, kind, thread, self_frame, self_cls));
        row.symbol_events += weight;
        row.symbol_total_events += weight;

        self.sum.categories_sum[self_category.index()][k] += weight;
        self.sum.categories_total[self_category.index()][k] += weight;
        let component = self.component(&self_component);
        component.add_self(kind, weight);
        component.add_total(kind, weight);

        let mut seen_categories = HashSet::from([self_category]);
        let mut seen_components = HashSet::from([self_component]);
        let mut seen_rows = HashSet::from([self_key]);
        for frame in chain.total_frames() {
            let cls = self.frame_classification(thread, frame);
            let category = cls.category;
            let component_key = (category, cls.sub_category_name.clone());

            let key = DetailKey::new(kind, thread.thread_id, frame);
            if seen_rows.insert(key.clone()) {
                self.details
                    .entry(key)
                    .or_insert_with(|| PerfSymbolDetail::new(self.step_id, kind, thread, frame, cls))
                    .symbol_total_events += weight;
            }
            if seen_categories.insert(category) {
                self.sum.categories_total[category.index()][k] += weight;
            }
            if seen_components.insert(component_key.clone()) {
                self.component(&component_key).add_total(kind, weight);
            }
        }
    }

    fn frame_classification(&self, thread: &Thread, frame: &Frame) -> Classification {
        override_with_thread(
            &frame.classification,
            &thread.classification,
            thread.rule_sub_category.as_deref(),
        )
    }

    fn component(&mut self, key: &(ComponentCategory, String)) -> &mut PerfComponent {
        self.components
            .entry(key.clone())
            .or_insert_with(|| PerfComponent {
                name: key.1.clone(),
                category: Some(key.0),
                ..Default::default()
            })
    }

    /// Back-fill file, thread and process events and emit rows ordered by
    /// event kind and descending self load.
    pub fn finish(self) -> (Vec<PerfSymbolDetail>, PerfStepSum) {
        let mut file_events: HashMap<(EventKind, String), u64> = HashMap::new();
        let mut thread_events: HashMap<(EventKind, i64), u64> = HashMap::new();
        let mut process_events: HashMap<(EventKind, i64), u64> = HashMap::new();
        for row in self.details.values() {
            *file_events.entry((row.event_kind, row.file.clone())).or_default() += row.symbol_events;
            *thread_events.entry((row.event_kind, row.thread_id)).or_default() += row.symbol_events;
            *process_events.entry((row.event_kind, row.process_id)).or_default() += row.symbol_events;
        }

        let mut details: Vec<PerfSymbolDetail> = self
            .details
            .into_values()
            .map(|mut row| {
                row.file_events = file_events[&(row.event_kind, row.file.clone())];
                row.thread_events = thread_events[&(row.event_kind, row.thread_id)];
                row.process_events = process_events[&(row.event_kind, row.process_id)];
                row
            })
            .collect();
        details.sort_by(|a, b| {
            a.event_kind
                .cmp(&b.event_kind)
                .then(b.symbol_events.cmp(&a.symbol_events))
                .then(b.symbol_total_events.cmp(&a.symbol_total_events))
                .then(a.thread_id.cmp(&b.thread_id))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let mut sum = self.sum;
        let mut components: Vec<PerfComponent> = self.components.into_values().collect();
        components.sort_by(|a, b| b.cycles.cmp(&a.cycles).then_with(|| a.name.cmp(&b.name)));
        sum.components = components;

        (details, sum)
    }
}

/// Aggregate one step's samples with a step context.
pub fn aggregate_step(
    ctx: &mut StepContext<'_>,
    step_id: u32,
    package_name: &str,
    samples: &[Sample],
) -> (Vec<PerfSymbolDetail>, PerfStepSum) {
    let mut aggregator = StepAggregator::new(step_id, package_name, samples);
    for sample in samples {
        aggregator.add(ctx, sample);
    }
    aggregator.finish()
}
