//! Processor (C6): builds tables out of segmentations.
//!
//! Grounded on `LTTL/Processor.py`. Every function here is a pure
//! reduction from one or more segmentations (plus a handful of knobs)
//! into a `Table`.

mod annotate_contexts;
mod collocations;
mod context;
mod cooc;
mod count;
mod length;
mod neighbors;
mod variety;

pub use annotate_contexts::{annotate_contexts, AnnotateContextsSpec, TieBreak};
pub use collocations::{collocations, CollocationRow, CollocationsSpec};
pub use context::{context, ConcordanceRow, ContextSpec};
pub use cooc::{cooc_in_context, cooc_in_window};
pub use count::{count_in_chain, count_in_context, count_in_window, ChainContextSpec, ContextGroupSpec};
pub use length::{length_in_context, length_in_window};
pub use neighbors::{neighbors, NeighborRow};
pub use variety::{variety_in_context, variety_in_window, VarietySpec};

use crate::segment::Segment;
use crate::segmentation::Segmentation;
use crate::table::{Label, TableHeader};

pub const GLOBAL_CONTEXT: &str = "__global__";

/// A unit segmentation plus the knobs shared by every counting function:
/// which annotation (if any) stands in for content, and whether units
/// are grouped into length-`seq_length` overlapping sequences joined by
/// `intra_seq_delimiter`.
#[derive(Clone, Copy)]
pub struct UnitSpec<'a> {
    pub segmentation: &'a Segmentation,
    pub annotation_key: Option<&'a str>,
    pub seq_length: usize,
    pub intra_seq_delimiter: &'a str,
}

impl<'a> UnitSpec<'a> {
    pub fn new(segmentation: &'a Segmentation) -> Self {
        Self {
            segmentation,
            annotation_key: None,
            seq_length: 1,
            intra_seq_delimiter: "#",
        }
    }

    /// Resolves every segment's type string up front (content, or the
    /// chosen annotation defaulting to `__none__`), in segmentation order.
    pub fn unit_list(&self) -> Vec<String> {
        self.segmentation
            .iter()
            .map(|s| unit_type_of(&s, self.annotation_key))
            .collect()
    }

    pub fn join(&self, types: &[String]) -> String {
        types.join(self.intra_seq_delimiter)
    }
}

pub(crate) fn unit_type_of(segment: &Segment, annotation_key: Option<&str>) -> String {
    match annotation_key {
        Some(key) => segment.annotation_or_none(key).to_string(),
        None => segment.content(),
    }
}

/// Records `key` in `order` (preserving first-appearance order) the first
/// time it's seen; every counting function in this module builds its
/// pivot axes this way rather than via an unordered set.
pub(crate) fn note_first_seen(order: &mut Vec<String>, seen: &mut crate::collections::HashSet<String>, key: &str) {
    if seen.insert(key.to_string()) {
        order.push(key.to_string());
    }
}

/// Shared header shape for the `IntPivotCrosstab`s these functions build:
/// `__context__` rows, `__unit__` columns, unit columns typed continuous.
pub(crate) fn counting_header(unit_types: &[String], row_type: crate::table::ColumnType) -> TableHeader {
    let mut col_type = crate::collections::HashMap::default();
    for u in unit_types {
        col_type.insert(u.clone(), crate::table::ColumnType::Continuous);
    }
    TableHeader {
        header_row_id: "__context__".to_string(),
        header_row_type: row_type,
        header_col_id: "__unit__".to_string(),
        header_col_type: crate::table::ColumnType::String,
        col_type,
        class_col_id: None,
    }
}

pub(crate) fn label_of(s: impl Into<String>) -> Label {
    Label::Str(s.into())
}
