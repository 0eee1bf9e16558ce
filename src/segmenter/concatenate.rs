use crate::segment::Segment;
use crate::segmentation::Segmentation;

use super::auto_number;

/// Merges several segmentations into one, keeping overall (str_index,
/// start, end) order within each str_index group but visiting str_index
/// groups in whichever order `sort` requests (or first-seen order
/// otherwise).
///
/// Grounded on `Segmenter.py::concatenate`: the original does a manual
/// k-way merge across one cursor per input segmentation sharing the
/// current str_index; this keeps the same shape but drives it off
/// `Segmentation::str_index_ptr` plus a scan forward, since each
/// segmentation's same-str_index segments are contiguous.
#[allow(clippy::too_many_arguments)]
pub fn concatenate(
    segmentations: &[&Segmentation],
    label: impl Into<String>,
    copy_annotations: bool,
    import_labels_as: Option<&str>,
    sort: bool,
    auto_number_as: Option<&str>,
    merge_duplicates: bool,
    progress_callback: Option<&dyn Fn()>,
) -> Segmentation {
    let mut new_segments = Segmentation::new(label);

    let mut str_indices: Vec<usize> = Vec::new();
    let mut seen = crate::collections::HashSet::default();
    for segmentation in segmentations {
        for &index in segmentation.str_index_ptr().keys() {
            if seen.insert(index) {
                str_indices.push(index);
            }
        }
    }
    if sort {
        str_indices.sort_unstable();
    }

    for index in str_indices {
        // One cursor per input segmentation that has segments at this
        // str_index, each initialized at its first matching segment.
        let mut cursors: Vec<(usize, usize)> = Vec::new(); // (segmentation position in `segmentations`, segment index)
        for (si, segmentation) in segmentations.iter().enumerate() {
            if let Some(&first) = segmentation.str_index_ptr().get(&index) {
                cursors.push((si, first));
            }
        }

        let mut last_seen: Option<Segment> = None;

        while !cursors.is_empty() {
            let mut min_idx = 0;
            let mut min_segment = segmentations[cursors[0].0].get(cursors[0].1);
            for (i, &(si, pos)) in cursors.iter().enumerate().skip(1) {
                let candidate = segmentations[si].get(pos);
                if (candidate.start_or_zero(), candidate.end_or_len())
                    < (min_segment.start_or_zero(), min_segment.end_or_len())
                {
                    min_segment = candidate;
                    min_idx = i;
                }
            }

            let (si, pos) = cursors[min_idx];
            let segmentation = segmentations[si];

            if pos + 1 >= segmentation.len() {
                cursors.remove(min_idx);
            } else {
                let next = segmentation.get(pos + 1);
                if next.str_index != index {
                    cursors.remove(min_idx);
                } else {
                    cursors[min_idx] = (si, pos + 1);
                }
            }

            let annotations = match import_labels_as.filter(|k| !k.is_empty()) {
                Some(key) => {
                    let extra: crate::segment::Annotations =
                        [(key.to_string(), segmentation.label().to_string())].into_iter().collect();
                    min_segment.deepcopy_annotations(copy_annotations, Some(&extra))
                }
                None => min_segment.deepcopy_annotations(copy_annotations, None),
            };

            let new_segment =
                Segment::with_annotations(min_segment.str_index, min_segment.start, min_segment.end, annotations);

            let is_duplicate = merge_duplicates
                && last_seen
                    .as_ref()
                    .is_some_and(|prev| prev.start == new_segment.start && prev.end == new_segment.end);

            if is_duplicate {
                let mut merged = new_segments.get(new_segments.len() - 1);
                for (k, v) in &new_segment.annotations {
                    merged.annotations.insert(k.clone(), v.clone());
                }
                new_segments.replace_last(merged);
            } else {
                new_segments.append(new_segment);
            }

            last_seen = Some(min_segment);

            if let Some(cb) = progress_callback {
                cb();
            }
        }
    }

    if let Some(key) = auto_number_as.filter(|k| !k.is_empty()) {
        auto_number(&mut new_segments, key);
    }

    new_segments
}
