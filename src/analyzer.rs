//! Analysis pipeline: trace databases in, attributed load out.
//!
//! Each trace database is one step group. Steps of all groups are numbered
//! up front in run order, then groups are analyzed independently, in
//! parallel when more than one worker is configured. Within a group every
//! step is processed sequentially with its own [`StepContext`].

use anyhow::{anyhow, bail, Context, Result};
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use workerpool::thunk::{Thunk, ThunkWorker};
use workerpool::Pool;

use crate::aggregate::{aggregate_step, PerfStepSum, PerfSymbolDetail};
use crate::category::EventKind;
use crate::classify::Classifier;
use crate::config::AnalyzerConfig;
use crate::context::StepContext;
use crate::output::write_outputs;
use crate::packages::PackageRegistry;
use crate::rules::RuleTables;
use crate::store::PerfStore;
use crate::trace::{derive_steps, TestStep, TraceDb};

/// Attributed load of one test step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: TestStep,
    pub details: Vec<PerfSymbolDetail>,
    pub sum: PerfStepSum,
}

/// Results of a whole run, ordered by step id.
#[derive(Debug, Clone, Default)]
pub struct PerfSum {
    pub steps: Vec<StepResult>,
}

impl PerfSum {
    pub fn step(&self, step_id: u32) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step.id == step_id)
    }

    pub fn test_steps(&self) -> Vec<TestStep> {
        self.steps.iter().map(|r| r.step.clone()).collect()
    }

    pub fn details(&self) -> impl Iterator<Item = &PerfSymbolDetail> {
        self.steps.iter().flat_map(|r| r.details.iter())
    }
}

struct StepGroup {
    db: TraceDb,
    steps: Vec<TestStep>,
}

/// Inputs shared read-only by every worker.
struct Shared {
    tables: RuleTables,
    packages: PackageRegistry,
    package_name: String,
    scene: Option<String>,
}

pub struct Analyzer {
    config: AnalyzerConfig,
    shared: Arc<Shared>,
}

impl Analyzer {
    /// Load and compile rules and seed the package registry.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let rules = config.load_rules()?;
        let tables = RuleTables::compile(&rules).context("Failed to compile rules")?;

        let mut packages = PackageRegistry::from_config(&rules.packages);
        if let Some(manifest) = &config.module_manifest {
            let added = packages.load_module_manifest(manifest)?;
            debug!("Registered {added} modules from {}", manifest.display());
        }
        for deps in &config.dependency_lists {
            let added = packages.load_dependency_list(deps)?;
            debug!("Registered {added} dependencies from {}", deps.display());
        }
        info!("Package registry holds {} entries", packages.len());

        let shared = Arc::new(Shared {
            tables,
            packages,
            package_name: config.package_name.clone(),
            scene: config.scene.clone(),
        });
        Ok(Self { config, shared })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze every trace, then write the store and file outputs that are
    /// configured.
    pub fn run(&self) -> Result<PerfSum> {
        let sum = self.analyze()?;

        if let Some(path) = &self.config.store {
            let mut store = if self.config.merge_store {
                PerfStore::open(path)?
            } else {
                PerfStore::create(path)?
            };
            let sums: Vec<PerfStepSum> = sum.steps.iter().map(|r| r.sum.clone()).collect();
            let details: Vec<PerfSymbolDetail> = sum.details().cloned().collect();
            store.write(&sum.test_steps(), &sums, &details)?;
            store.flush()?;
        }

        if let Some(dir) = &self.config.output_dir {
            write_outputs(dir, &sum, &self.config.package_name)?;
        }

        Ok(sum)
    }

    /// Analyze every trace without writing anything.
    pub fn analyze(&self) -> Result<PerfSum> {
        if self.config.traces.is_empty() {
            bail!("No trace databases given");
        }
        let groups = self.plan()?;

        let workers = self.config.workers.max(1).min(groups.len());
        let results = if workers <= 1 {
            groups
                .into_iter()
                .map(|group| analyze_group(&self.shared, group))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.analyze_parallel(groups, workers)?
        };

        let mut steps: Vec<StepResult> = results.into_iter().flatten().collect();
        steps.sort_by_key(|r| r.step.id);
        Ok(PerfSum { steps })
    }

    /// Open every trace and number the steps of all groups in run order.
    fn plan(&self) -> Result<Vec<StepGroup>> {
        let mut groups = Vec::new();
        let mut next_id = 1u32;
        for (i, path) in self.config.traces.iter().enumerate() {
            let db = TraceDb::open(path)?;
            let markers = db.markers(self.config.marker_pid)?;
            let range = db.sample_time_range()?;
            let steps = derive_steps(&markers, range, i as u32 + 1, next_id);
            info!(
                "{}: {} steps ({} markers)",
                path.display(),
                steps.len(),
                markers.len()
            );
            next_id += steps.len() as u32;
            groups.push(StepGroup { db, steps });
        }
        Ok(groups)
    }

    fn analyze_parallel(&self, groups: Vec<StepGroup>, workers: usize) -> Result<Vec<Vec<StepResult>>> {
        let expected = groups.len();
        let results = Arc::new(Mutex::new(Vec::new()));
        let pool = Pool::<ThunkWorker<()>>::new(workers);

        for (index, group) in groups.into_iter().enumerate() {
            let shared = self.shared.clone();
            let results = results.clone();
            pool.execute(Thunk::of(move || {
                let path = group.db.path().to_path_buf();
                let result = analyze_group(&shared, group);
                if let Ok(mut results) = results.lock() {
                    results.push((index, path, result));
                }
            }));
        }
        pool.join();

        let mut collected: Vec<(usize, PathBuf, Result<Vec<StepResult>>)> = mem::take(
            &mut *results
                .lock()
                .map_err(|_| anyhow!("Step group results are poisoned"))?,
        );
        if collected.len() != expected {
            bail!(
                "Only {} of {expected} step groups finished",
                collected.len()
            );
        }
        collected.sort_by_key(|(index, _, _)| *index);
        collected
            .into_iter()
            .map(|(_, path, result)| {
                result.with_context(|| format!("Failed to analyze {}", path.display()))
            })
            .collect()
    }
}

fn analyze_group(shared: &Shared, group: StepGroup) -> Result<Vec<StepResult>> {
    let dict = group.db.load_dictionary()?;
    let classifier = Classifier::new(
        &shared.tables,
        &shared.packages,
        &shared.package_name,
        shared.scene.as_deref(),
    );

    let mut results = Vec::with_capacity(group.steps.len());
    for step in group.steps {
        let samples = group.db.samples(step.start, step.end)?;
        let mut ctx = StepContext::new(classifier, &dict);
        let (details, sum) = aggregate_step(&mut ctx, step.id, &shared.package_name, &samples);
        info!(
            "Step {} ({}): {} samples, {} callchains, {} cycles, {} instructions, {} skipped",
            step.id,
            step.name,
            samples.len(),
            ctx.cached_callchains(),
            sum.total[EventKind::Cycles.index()],
            sum.total[EventKind::Instructions.index()],
            sum.skipped.iter().sum::<u64>(),
        );
        results.push(StepResult { step, details, sum });
    }
    Ok(results)
}
