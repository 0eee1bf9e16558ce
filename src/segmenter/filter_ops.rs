use regex::Regex;

use crate::collections::{ExactCounter, HashSet};
use crate::segment::Segment;
use crate::segmentation::Segmentation;

use super::auto_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// Splits `segmentation` into (kept, rejected) according to `predicate`
/// and `mode`, copying every segment either way. Shared scaffolding
/// behind `select`/`threshold`/`intersect`, which only differ in how
/// `predicate` is computed.
#[allow(clippy::too_many_arguments)]
fn partition(
    segmentation: &Segmentation,
    mut predicate: impl FnMut(&Segment) -> bool,
    mode: FilterMode,
    label: impl Into<String>,
    copy_annotations: bool,
    auto_number_as: Option<&str>,
    progress_callback: Option<&dyn Fn()>,
) -> (Segmentation, Segmentation) {
    let label = label.into();
    let mut kept = Segmentation::new(label.clone());
    let mut rejected = Segmentation::new(format!("NEG_{label}"));

    for segment in segmentation.iter() {
        let matched = predicate(&segment);
        let annotations = segment.deepcopy_annotations(copy_annotations, None);
        let new_segment = Segment::with_annotations(segment.str_index, segment.start, segment.end, annotations);

        if (matched && mode == FilterMode::Include) || (!matched && mode == FilterMode::Exclude) {
            kept.append(new_segment);
        } else {
            rejected.append(new_segment);
        }

        if let Some(cb) = progress_callback {
            cb();
        }
    }

    if let Some(key) = auto_number_as.filter(|k| !k.is_empty()) {
        auto_number(&mut kept, key);
        auto_number(&mut rejected, key);
    }

    (kept, rejected)
}

/// In-/excludes segments whose content (or, if `annotation_key` is set,
/// whose annotation value) matches `regex`.
#[allow(clippy::too_many_arguments)]
pub fn select(
    segmentation: &Segmentation,
    regex: &Regex,
    mode: FilterMode,
    annotation_key: Option<&str>,
    label: impl Into<String>,
    copy_annotations: bool,
    auto_number_as: Option<&str>,
    progress_callback: Option<&dyn Fn()>,
) -> (Segmentation, Segmentation) {
    partition(
        segmentation,
        |segment| match annotation_key {
            Some(key) => segment.annotations.get(key).is_some_and(|v| regex.is_match(v)),
            None => regex.is_match(&segment.content()),
        },
        mode,
        label,
        copy_annotations,
        auto_number_as,
        progress_callback,
    )
}

/// In-/excludes segments whose type (content, or annotation value)
/// occurs between `min_count` and `max_count` times (inclusive) in
/// `segmentation`.
#[allow(clippy::too_many_arguments)]
pub fn threshold(
    segmentation: &Segmentation,
    min_count: Option<u64>,
    max_count: Option<u64>,
    annotation_key: Option<&str>,
    label: impl Into<String>,
    copy_annotations: bool,
    auto_number_as: Option<&str>,
    progress_callback: Option<&dyn Fn()>,
) -> (Segmentation, Segmentation) {
    let min_count = min_count.unwrap_or(0);
    let max_count = max_count.unwrap_or(segmentation.len() as u64);

    let mut counter: ExactCounter<String> = ExactCounter::new();
    for segment in segmentation.iter() {
        match annotation_key {
            Some(key) => {
                if let Some(v) = segment.annotations.get(key) {
                    counter.add(v.clone());
                }
            }
            None => counter.add(segment.content()),
        }
    }

    partition(
        segmentation,
        |segment| {
            let token = match annotation_key {
                Some(key) => segment.annotation_or_none(key).to_string(),
                None => segment.content(),
            };
            let count = counter.get(&token);
            min_count <= count && count <= max_count
        },
        FilterMode::Include,
        label,
        copy_annotations,
        auto_number_as,
        progress_callback,
    )
}

/// In-/excludes segments of `source` whose type (content, or annotation
/// value) also occurs in `filtering`.
#[allow(clippy::too_many_arguments)]
pub fn intersect(
    source: &Segmentation,
    filtering: &Segmentation,
    source_annotation_key: Option<&str>,
    filtering_annotation_key: Option<&str>,
    mode: FilterMode,
    label: impl Into<String>,
    copy_annotations: bool,
    auto_number_as: Option<&str>,
    progress_callback: Option<&dyn Fn()>,
) -> (Segmentation, Segmentation) {
    let mut filtering_set: HashSet<String> = HashSet::default();
    for segment in filtering.iter() {
        match filtering_annotation_key {
            Some(key) => {
                if let Some(v) = segment.annotations.get(key) {
                    filtering_set.insert(v.clone());
                }
            }
            None => {
                filtering_set.insert(segment.content());
            }
        }
    }

    partition(
        source,
        |segment| match source_annotation_key {
            Some(key) => segment.annotations.get(key).is_some_and(|v| filtering_set.contains(v)),
            None => filtering_set.contains(&segment.content()),
        },
        mode,
        label,
        copy_annotations,
        auto_number_as,
        progress_callback,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    fn words(text: &str) -> Segmentation {
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("words");
        let mut pos = 0;
        for word in text.split_whitespace() {
            let start = text[pos..].find(word).unwrap() + pos;
            let char_start = text[..start].chars().count();
            let char_end = char_start + word.chars().count();
            seg.append(Segment::new(str_index, Some(char_start), Some(char_end)));
            pos = start + word.len();
        }
        seg
    }

    #[test]
    fn select_splits_by_regex() {
        let seg = words("apple banana cherry");
        let re = Regex::new("^a").unwrap();
        let (kept, rejected) = select(&seg, &re, FilterMode::Include, None, "sel", true, None, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(rejected.len(), 2);
        assert_eq!(kept.get(0).content(), "apple");
    }

    #[test]
    fn threshold_filters_by_frequency() {
        let seg = words("a b a c a");
        let (kept, _rejected) = threshold(&seg, Some(2), None, None, "th", true, None, None);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|s| s.content() == "a"));
    }

    #[test]
    fn intersect_keeps_common_types() {
        let source = words("apple banana cherry");
        let filtering = words("banana date");
        let (kept, rejected) = intersect(&source, &filtering, None, None, FilterMode::Include, "int", true, None, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0).content(), "banana");
        assert_eq!(rejected.len(), 2);
    }
}
