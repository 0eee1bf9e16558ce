//! Segmenter transforms (C4): concatenate, tokenize, select, threshold,
//! sample, intersect, import_xml, recode, bypass.
//!
//! Grounded on `LTTL/Segmenter.py`. Every transform builds a fresh
//! `Segmentation` from an existing one (or several); none mutate their
//! inputs.

mod bypass;
mod concatenate;
mod filter_ops;
mod import_xml;
mod recode;
mod sample;
mod tokenize;

pub use bypass::bypass;
pub use concatenate::concatenate;
pub use filter_ops::{intersect, select, threshold, FilterMode};
pub use import_xml::import_xml;
pub use recode::{recode, Case};
pub use sample::{sample, SampleMode};
pub use tokenize::{tokenize, TokenRule, TokenizeMode};

use crate::segment::Annotations;
use crate::segmentation::Segmentation;

/// Adds a 1-based sequential integer annotation to every segment,
/// in place. Grounded on `Segmenter.py::_auto_number`.
pub(crate) fn auto_number(segmentation: &mut Segmentation, annotation_key: &str) {
    let rebuilt: Vec<_> = segmentation
        .iter()
        .enumerate()
        .map(|(i, mut seg)| {
            seg.annotations.insert(annotation_key.to_string(), (i + 1).to_string());
            seg
        })
        .collect();
    let label = segmentation.label().to_string();
    *segmentation = Segmentation::new(label);
    segmentation.extend(rebuilt);
}

/// Collapses consecutive segments sharing the same (str_index, start,
/// end) address, merging their annotations. Relies on the input being
/// address-sorted, as every caller (`tokenize`, `import_xml`) already
/// guarantees. `take_first` controls which side wins on annotation-key
/// conflicts.
pub(crate) fn merge_duplicate_segments(segmentation: Segmentation, take_first: bool) -> Segmentation {
    let label = segmentation.label().to_string();
    let mut out = Segmentation::new(label);
    let mut last: Option<crate::segment::Segment> = None;

    for segment in segmentation.iter() {
        let is_duplicate = last.as_ref().is_some_and(|prev| {
            prev.str_index == segment.str_index && prev.start == segment.start && prev.end == segment.end
        });

        if is_duplicate {
            let prev = last.take().unwrap();
            let merged_annotations: Annotations = if take_first {
                let mut merged = segment.annotations.clone();
                for (k, v) in &prev.annotations {
                    merged.insert(k.clone(), v.clone());
                }
                merged
            } else {
                let mut merged = prev.annotations.clone();
                for (k, v) in &segment.annotations {
                    merged.insert(k.clone(), v.clone());
                }
                merged
            };
            let merged_segment = crate::segment::Segment::with_annotations(
                segment.str_index,
                segment.start,
                segment.end,
                merged_annotations,
            );
            out.replace_last(merged_segment.clone());
            last = Some(merged_segment);
        } else {
            out.append(segment.clone());
            last = Some(segment);
        }
    }
    out
}
