//! Per-step analysis context.
//!
//! Every classification cache of a step lives in a [`StepContext`]. A
//! context is created fresh for each step and dropped when the step is done,
//! so no classification state can leak from one step into the next.

use std::collections::HashMap;

use crate::callchain::{attribute, Attribution, Frame};
use crate::category::{Classification, FileClassification, ProcessClassification};
use crate::classify::{Classifier, SymbolClassification};
use crate::trace::{CallchainFrameRecord, TraceDictionary};

/// A thread seen in the step, with its process resolved and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub thread_id: i64,
    pub process_id: i64,
    pub name: String,
    pub process_name: String,
    pub system_classification: ProcessClassification,
    pub classification: Classification,
    /// Sub-category named by the matching thread rule, if any.
    pub rule_sub_category: Option<String>,
}

pub struct StepContext<'a> {
    classifier: Classifier<'a>,
    dict: &'a TraceDictionary,
    multiplatform_marker: bool,
    processes: HashMap<i64, ProcessClassification>,
    threads: HashMap<i64, Thread>,
    files: HashMap<i64, FileClassification>,
    /// Symbol refinements keyed by `(file_id, symbol_id)`; the same symbol
    /// string is shared by every file in the dictionary.
    symbols: HashMap<(i64, i64), SymbolClassification>,
    callchains: HashMap<i64, Attribution>,
}

impl<'a> StepContext<'a> {
    pub fn new(classifier: Classifier<'a>, dict: &'a TraceDictionary) -> Self {
        let multiplatform_marker =
            dict.has_library(&classifier.tables.multiplatform.marker_library);
        Self {
            classifier,
            dict,
            multiplatform_marker,
            processes: HashMap::new(),
            threads: HashMap::new(),
            files: HashMap::new(),
            symbols: HashMap::new(),
            callchains: HashMap::new(),
        }
    }

    pub fn classifier(&self) -> &Classifier<'a> {
        &self.classifier
    }

    pub fn multiplatform_marker(&self) -> bool {
        self.multiplatform_marker
    }

    /// Resolve and classify a thread, once per thread id.
    pub fn thread(&mut self, thread_id: i64) -> &Thread {
        self.ensure_thread(thread_id);
        &self.threads[&thread_id]
    }

    /// Thread and attributed callchain of one sample.
    pub fn resolve(&mut self, thread_id: i64, callchain_id: i64) -> (&Thread, &Attribution) {
        self.ensure_thread(thread_id);
        self.ensure_callchain(callchain_id);
        (&self.threads[&thread_id], &self.callchains[&callchain_id])
    }

    fn ensure_thread(&mut self, thread_id: i64) {
        if !self.threads.contains_key(&thread_id) {
            let thread = self.build_thread(thread_id);
            self.threads.insert(thread_id, thread);
        }
    }

    fn build_thread(&mut self, thread_id: i64) -> Thread {
        let dict = self.dict;
        let record = dict.threads.get(&thread_id);
        let process_id = record.map_or(-1, |r| r.process_id);
        let name = record
            .and_then(|r| r.name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let process_name = dict
            .process_name(process_id)
            .unwrap_or("unknown")
            .to_string();

        let classifier = self.classifier;
        let system_classification = self
            .processes
            .entry(process_id)
            .or_insert_with(|| classifier.process(&process_name))
            .clone();
        let (classification, rule_sub_category) =
            classifier.thread(record.and_then(|r| r.name.as_deref()));

        Thread {
            thread_id,
            process_id,
            name,
            process_name,
            system_classification,
            classification,
            rule_sub_category,
        }
    }

    fn frame(&mut self, record: &CallchainFrameRecord) -> Frame {
        let classifier = self.classifier;
        let marker = self.multiplatform_marker;
        let dict = self.dict;
        let raw_file = dict.file_path(record.file_id);
        let raw_symbol = dict.symbol(record.symbol_id);

        let file = self
            .files
            .entry(record.file_id)
            .or_insert_with(|| classifier.file(raw_file, marker));
        let symbol = self
            .symbols
            .entry((record.file_id, record.symbol_id))
            .or_insert_with(|| classifier.symbol(raw_symbol, file));

        let logical_file = match classifier.split(&file.file, raw_symbol) {
            Some(destination) => destination.to_string(),
            None => symbol.file.file.clone(),
        };

        Frame {
            depth: record.depth,
            file_id: record.file_id,
            symbol_id: record.symbol_id,
            raw_file: raw_file.to_string(),
            raw_symbol: raw_symbol.to_string(),
            file: logical_file,
            symbol: symbol.symbol.clone(),
            classification: symbol.file.classification.clone(),
        }
    }

    /// Classify and attribute a callchain, once per callchain id.
    pub fn callchain(&mut self, callchain_id: i64) -> &Attribution {
        self.ensure_callchain(callchain_id);
        &self.callchains[&callchain_id]
    }

    fn ensure_callchain(&mut self, callchain_id: i64) {
        if self.callchains.contains_key(&callchain_id) {
            return;
        }
        let dict = self.dict;
        let frames = dict
            .callchains
            .get(&callchain_id)
            .map(|records| records.iter().map(|r| self.frame(r)).collect())
            .unwrap_or_default();
        let attribution = attribute(&self.classifier, callchain_id, frames);
        self.callchains.insert(callchain_id, attribution);
    }

    pub fn cached_callchains(&self) -> usize {
        self.callchains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ComponentCategory;
    use crate::config::RuleConfig;
    use crate::packages::PackageRegistry;
    use crate::rules::RuleTables;
    use crate::trace::ThreadRecord;

    fn tables() -> RuleTables {
        let json = r#"
        {
            "processes": [
                { "pattern": "^render_service$", "domain": "Graphic", "sub_system": "Render", "component": "rs" }
            ],
            "threads": [
                { "pattern": "^RSRenderThread", "category": "SYS_SDK", "category_name": "Render" }
            ],
            "symbol_splits": [
                { "source_file": "libark_jsruntime\\.so$", "symbols": ["GC"], "destination": "ArkRuntime/GC" }
            ],
            "multiplatform": { "graphics_libraries": ["libskia.so"] }
        }
        "#;
        RuleTables::compile(&RuleConfig::from_json(json).unwrap()).unwrap()
    }

    fn dictionary() -> TraceDictionary {
        let mut dict = TraceDictionary::default();
        dict.files.insert(1, "/data/storage/el1/bundle/entry/ets/modules.abc".to_string());
        dict.files.insert(2, "/system/lib64/libark_jsruntime.so".to_string());
        dict.files.insert(3, "/data/storage/el1/bundle/libs/arm64/libskia.so".to_string());
        dict.symbols.insert(10, "foo:[url:entry|@scope/pkg|1.2.3|src/a.ts:10:2]".to_string());
        dict.symbols.insert(11, "panda::GC::Run".to_string());
        dict.symbols.insert(12, "SkCanvas::draw".to_string());
        for (tid, pid, name) in [
            (100, 100, "com.example.app"),
            (101, 100, "RSRenderThread"),
            (200, 200, "render_service"),
        ] {
            dict.threads.insert(
                tid,
                ThreadRecord {
                    thread_id: tid,
                    process_id: pid,
                    name: Some(name.to_string()),
                },
            );
        }
        dict.callchains.insert(
            7,
            vec![
                CallchainFrameRecord {
                    callchain_id: 7,
                    depth: 0,
                    file_id: 2,
                    symbol_id: 11,
                },
                CallchainFrameRecord {
                    callchain_id: 7,
                    depth: 1,
                    file_id: 1,
                    symbol_id: 10,
                },
            ],
        );
        dict
    }

    #[test]
    fn test_thread_resolution() {
        let t = tables();
        let registry = PackageRegistry::default();
        let dict = dictionary();
        let mut ctx = StepContext::new(Classifier::new(&t, &registry, "com.example.app", None), &dict);

        let render = ctx.thread(101).clone();
        assert_eq!(render.process_name, "com.example.app");
        assert!(render.system_classification.is_main_app);
        assert_eq!(render.classification.category, ComponentCategory::SysSdk);
        assert_eq!(render.classification.category_name, "Render");

        let rs = ctx.thread(200).clone();
        assert!(!rs.system_classification.is_main_app);
        assert_eq!(rs.system_classification.component, "rs");
        assert!(rs.classification.is_unknown());

        let missing = ctx.thread(999).clone();
        assert_eq!(missing.name, "unknown");
        assert_eq!(missing.process_id, -1);
    }

    #[test]
    fn test_callchain_frames_classified_and_split() {
        let t = tables();
        let registry = PackageRegistry::default();
        let dict = dictionary();
        let mut ctx = StepContext::new(Classifier::new(&t, &registry, "com.example.app", None), &dict);

        let Attribution::Attributed(chain) = ctx.callchain(7).clone() else {
            panic!("callchain skipped");
        };
        assert_eq!(chain.frames[0].file, "ArkRuntime/GC");
        assert_eq!(chain.frames[0].classification.category, ComponentCategory::SysSdk);
        assert_eq!(chain.frames[1].symbol, "foo");
        assert_eq!(chain.frames[1].file, "@scope/pkg/1.2.3/src/a.ts");
        assert_eq!(chain.frames[1].classification.category, ComponentCategory::AppAbc);

        ctx.callchain(7);
        assert_eq!(ctx.cached_callchains(), 1);

        let Attribution::Attributed(unknown) = ctx.callchain(42).clone() else {
            panic!("callchain skipped");
        };
        assert_eq!(unknown.self_frame().file, "[unknown]");
    }

    #[test]
    fn test_symbol_shared_across_files() {
        let t = tables();
        let registry = PackageRegistry::default();
        let mut dict = dictionary();
        dict.files.insert(5, "/data/storage/el1/bundle/libs/arm64/libentry.so".to_string());
        dict.files.insert(6, "/system/lib64/libfoo.so".to_string());
        dict.symbols.insert(20, "main".to_string());
        for (id, file_id) in [(21, 5), (22, 6)] {
            dict.callchains.insert(
                id,
                vec![CallchainFrameRecord {
                    callchain_id: id,
                    depth: 0,
                    file_id,
                    symbol_id: 20,
                }],
            );
        }
        let mut ctx = StepContext::new(Classifier::new(&t, &registry, "com.example.app", None), &dict);

        let Attribution::Attributed(app) = ctx.callchain(21).clone() else {
            panic!("callchain skipped");
        };
        assert_eq!(app.frames[0].file, "/data/storage/el1/bundle/libs/arm64/libentry.so");
        assert_eq!(app.frames[0].category(), ComponentCategory::AppSo);

        let Attribution::Attributed(system) = ctx.callchain(22).clone() else {
            panic!("callchain skipped");
        };
        assert_eq!(system.frames[0].file, "/system/lib64/libfoo.so");
        assert_eq!(system.frames[0].category(), ComponentCategory::SysSdk);
        assert_eq!(system.frames[0].classification.sub_category_name, "libfoo.so");
    }

    #[test]
    fn test_multiplatform_marker_detection() {
        let t = tables();
        let registry = PackageRegistry::default();
        let mut dict = dictionary();
        let ctx = StepContext::new(Classifier::new(&t, &registry, "com.example.app", None), &dict);
        assert!(!ctx.multiplatform_marker());

        dict.files.insert(4, "/data/storage/el1/bundle/libs/arm64/libkn.so".to_string());
        let ctx = StepContext::new(Classifier::new(&t, &registry, "com.example.app", None), &dict);
        assert!(ctx.multiplatform_marker());
    }
}
