//! Self/total load attribution over deduplicated call stacks.
//!
//! Each callchain is attributed once per step:
//!
//! 1. A callchain whose leaf symbol is a diagnostic (DFX) symbol is skipped
//!    entirely; its events are reported as skipped.
//! 2. The self frame is the first frame, walking from the leaf toward the
//!    root, that is not pure compute. Pure compute frames match a configured
//!    compute file/symbol pair or have an unknown category. When every frame
//!    is pure compute the leaf owns the self weight.
//! 3. Walking on toward the root, the first frame of every category not seen
//!    yet (the self frame's category is seen from the start) receives total
//!    weight, so inclusive time is counted once per category per sample.

use std::collections::HashSet;

use crate::category::{Classification, ComponentCategory};
use crate::classify::Classifier;

/// A classified stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub depth: u32,
    pub file_id: i64,
    pub symbol_id: i64,
    /// Path as recorded in the trace.
    pub raw_file: String,
    /// Symbol text as recorded in the trace.
    pub raw_symbol: String,
    /// Logical file used as accounting key.
    pub file: String,
    /// Display symbol.
    pub symbol: String,
    pub classification: Classification,
}

impl Frame {
    /// Stand-in for samples whose call stack was not recorded.
    pub fn unknown() -> Self {
        Self {
            depth: 0,
            file_id: -1,
            symbol_id: -1,
            raw_file: "[unknown]".to_string(),
            raw_symbol: "[unknown]".to_string(),
            file: "[unknown]".to_string(),
            symbol: "[unknown]".to_string(),
            classification: Classification::unknown(),
        }
    }

    pub fn category(&self) -> ComponentCategory {
        self.classification.category
    }
}

/// An attributed callchain. Frames are leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callchain {
    pub callchain_id: i64,
    pub frames: Vec<Frame>,
    pub self_index: usize,
    pub total_indices: Vec<usize>,
}

impl Callchain {
    pub fn self_frame(&self) -> &Frame {
        &self.frames[self.self_index]
    }

    pub fn total_frames(&self) -> impl Iterator<Item = &Frame> {
        self.total_indices.iter().map(|&i| &self.frames[i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Leaf is a diagnostic symbol; the callchain carries no component load.
    Skipped,
    Attributed(Callchain),
}

fn is_pure_compute(classifier: &Classifier<'_>, frame: &Frame) -> bool {
    frame.classification.is_unknown() || classifier.is_compute(&frame.raw_file, &frame.raw_symbol)
}

/// Attribute a callchain. An empty frame list is attributed to
/// [`Frame::unknown`].
pub fn attribute(classifier: &Classifier<'_>, callchain_id: i64, mut frames: Vec<Frame>) -> Attribution {
    if frames.is_empty() {
        frames.push(Frame::unknown());
    }

    if classifier.is_dfx(&frames[0].raw_symbol) {
        return Attribution::Skipped;
    }

    let self_index = frames
        .iter()
        .position(|frame| !is_pure_compute(classifier, frame))
        .unwrap_or(0);

    let mut seen = HashSet::from([frames[self_index].category()]);
    let total_indices = frames
        .iter()
        .enumerate()
        .skip(self_index + 1)
        .filter(|(_, frame)| seen.insert(frame.category()))
        .map(|(i, _)| i)
        .collect();

    Attribution::Attributed(Callchain {
        callchain_id,
        frames,
        self_index,
        total_indices,
    })
}
