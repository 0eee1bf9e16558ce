use crate::collections::HashSet;
use crate::segmentation::Segmentation;
use crate::table::{ColumnType, Label, Table};

use super::{counting_header, label_of, note_first_seen, unit_type_of, UnitSpec, GLOBAL_CONTEXT};

/// The context half of `count_in_context`: an optional segmentation (no
/// segmentation means "the whole corpus is one context"), an optional
/// annotation key standing in for content, and whether all contexts
/// collapse into a single row.
#[derive(Clone, Copy, Default)]
pub struct ContextGroupSpec<'a> {
    pub segmentation: Option<&'a Segmentation>,
    pub annotation_key: Option<&'a str>,
    pub merge: bool,
}

/// Counts, for each context segment, how many times each unit type
/// occurs among the unit segments it contains (or among the
/// `seq_length`-long contiguous runs of them). With no context
/// segmentation the whole corpus is a single `__global__` context.
///
/// Grounded on `Processor.py::count_in_context`.
pub fn count_in_context(units: UnitSpec, contexts: ContextGroupSpec) -> Table {
    let mut context_types: Vec<String> = Vec::new();
    let mut unit_types: Vec<String> = Vec::new();
    let mut context_seen: HashSet<String> = HashSet::default();
    let mut unit_seen: HashSet<String> = HashSet::default();
    let mut freq: crate::collections::HashMap<(String, String), i64> = crate::collections::HashMap::default();

    let unit_list = units.unit_list();

    match contexts.segmentation {
        Some(context_segmentation) => {
            for context_segment in context_segmentation.iter() {
                let context_type = if contexts.merge {
                    GLOBAL_CONTEXT.to_string()
                } else {
                    unit_type_of(&context_segment, contexts.annotation_key)
                };
                if !contexts.merge {
                    note_first_seen(&mut context_types, &mut context_seen, &context_type);
                }

                if units.seq_length > 1 {
                    for seq_start in context_segment.get_contained_sequence_indices(units.segmentation, units.seq_length) {
                        let unit_type = units.join(&unit_list[seq_start..seq_start + units.seq_length]);
                        note_first_seen(&mut unit_types, &mut unit_seen, &unit_type);
                        *freq.entry((context_type.clone(), unit_type)).or_insert(0) += 1;
                    }
                } else {
                    for unit_index in context_segment.get_contained_segment_indices(units.segmentation) {
                        let unit_type = &unit_list[unit_index];
                        note_first_seen(&mut unit_types, &mut unit_seen, unit_type);
                        *freq.entry((context_type.clone(), unit_type.clone())).or_insert(0) += 1;
                    }
                }
            }
            if !freq.is_empty() && context_types.is_empty() {
                context_types.push(GLOBAL_CONTEXT.to_string());
            }
        }
        None => {
            context_types.push(GLOBAL_CONTEXT.to_string());
            if units.seq_length > 1 {
                for unit_index in 0..unit_list.len().saturating_sub(units.seq_length - 1) {
                    let unit_type = units.join(&unit_list[unit_index..unit_index + units.seq_length]);
                    note_first_seen(&mut unit_types, &mut unit_seen, &unit_type);
                    *freq.entry((GLOBAL_CONTEXT.to_string(), unit_type)).or_insert(0) += 1;
                }
            } else {
                for unit_type in &unit_list {
                    note_first_seen(&mut unit_types, &mut unit_seen, unit_type);
                    *freq.entry((GLOBAL_CONTEXT.to_string(), unit_type.clone())).or_insert(0) += 1;
                }
            }
        }
    }

    build_table(context_types, unit_types, freq, ColumnType::String)
}

/// Slides a window of `window_size` units across `units.segmentation`
/// one position at a time; each window is a row (1-based, numbered as a
/// string), and each contained unit type bumps a cell. Built
/// incrementally: the first window's histogram is computed directly,
/// then each subsequent step decrements the leaving unit(s) and
/// increments the entering one.
///
/// Grounded on `Processor.py::count_in_window`.
pub fn count_in_window(units: UnitSpec, window_size: usize) -> Table {
    let mut unit_types: Vec<String> = Vec::new();
    let mut unit_seen: HashSet<String> = HashSet::default();
    let mut freq: crate::collections::HashMap<(String, String), i64> = crate::collections::HashMap::default();
    let mut window_type = 1usize;

    let len = units.segmentation.len();
    tracing::debug!(window_size, units = len, "sliding count window");
    if len > 0 && window_size <= len && window_size >= units.seq_length && units.seq_length >= 1 {
        let unit_list = units.unit_list();
        let seq_len = units.seq_length;

        let seq_at = |start: usize| units.join(&unit_list[start..start + seq_len]);

        let mut window_freq: crate::collections::HashMap<String, i64> = crate::collections::HashMap::default();
        for unit_index in 0..=(window_size - seq_len) {
            let t = seq_at(unit_index);
            note_first_seen(&mut unit_types, &mut unit_seen, &t);
            *window_freq.entry(t).or_insert(0) += 1;
        }
        for (t, v) in &window_freq {
            freq.insert(("1".to_string(), t.clone()), *v);
        }

        for window_index in 1..=(len - window_size) {
            let leaving = seq_at(window_index - 1);
            *window_freq.entry(leaving).or_insert(0) -= 1;

            let entering_start = window_index + window_size - seq_len;
            let entering = seq_at(entering_start);
            note_first_seen(&mut unit_types, &mut unit_seen, &entering);
            *window_freq.entry(entering).or_insert(0) += 1;

            window_type = window_index + 1;
            let window_str = window_type.to_string();
            for (t, v) in &window_freq {
                freq.insert((window_str.clone(), t.clone()), *v);
            }
        }
        tracing::trace!(windows = window_type, "count window slide complete");
    }

    let context_types: Vec<String> = (1..=window_type).map(|i| i.to_string()).collect();
    build_table(context_types, unit_types, freq, ColumnType::Continuous)
}

/// The context half of `count_in_chain`: sizes of the left/right context
/// windows flanking each unit (sequence), the marker string placed
/// between them, and whether units from different underlying strings
/// may be chained together.
pub struct ChainContextSpec<'a> {
    pub left_size: usize,
    pub right_size: usize,
    pub unit_pos_marker: &'a str,
    pub merge_strings: bool,
}

impl Default for ChainContextSpec<'_> {
    fn default() -> Self {
        Self {
            left_size: 1,
            right_size: 0,
            unit_pos_marker: "_",
            merge_strings: false,
        }
    }
}

/// Counts units (or unit sequences) against their immediate left/right
/// context, skipping windows that straddle more than one underlying
/// string unless `merge_strings` is set.
///
/// Grounded on `Processor.py::count_in_chain`.
pub fn count_in_chain(units: UnitSpec, contexts: ChainContextSpec) -> Table {
    let mut context_types: Vec<String> = Vec::new();
    let mut unit_types: Vec<String> = Vec::new();
    let mut context_seen: HashSet<String> = HashSet::default();
    let mut unit_seen: HashSet<String> = HashSet::default();
    let mut freq: crate::collections::HashMap<(String, String), i64> = crate::collections::HashMap::default();

    let window_size = contexts.left_size + contexts.right_size + units.seq_length;
    let len = units.segmentation.len();

    if len >= window_size {
        let unit_list = units.unit_list();
        let str_indices: Vec<usize> = units.segmentation.iter().map(|s| s.real_str_index()).collect();

        for window_index in 0..=(len - window_size) {
            let idx_slice = &str_indices[window_index..window_index + window_size];
            if !contexts.merge_strings && idx_slice.iter().any(|&i| i != idx_slice[0]) {
                continue;
            }

            let left = units.join(&unit_list[window_index..window_index + contexts.left_size]);
            let right_start = window_index + contexts.left_size + units.seq_length;
            let right = units.join(&unit_list[right_start..window_index + window_size]);
            let context_type = format!("{left}{}{right}", contexts.unit_pos_marker);

            let unit_start = window_index + contexts.left_size;
            let unit_type = units.join(&unit_list[unit_start..unit_start + units.seq_length]);

            note_first_seen(&mut context_types, &mut context_seen, &context_type);
            note_first_seen(&mut unit_types, &mut unit_seen, &unit_type);
            *freq.entry((context_type, unit_type)).or_insert(0) += 1;
        }
    }

    build_table(context_types, unit_types, freq, ColumnType::String)
}

fn build_table(
    context_types: Vec<String>,
    unit_types: Vec<String>,
    freq: crate::collections::HashMap<(String, String), i64>,
    row_type: ColumnType,
) -> Table {
    let header = counting_header(&unit_types, row_type);
    let row_ids: Vec<Label> = context_types.into_iter().map(label_of).collect();
    let col_ids: Vec<Label> = unit_types.into_iter().map(label_of).collect();
    let mut table = crate::table::IntPivotCrosstab::new(row_ids, col_ids, header);
    for ((context_type, unit_type), count) in freq {
        table.set(label_of(context_type), label_of(unit_type), count);
    }
    Table::IntPivot(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
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
    fn count_in_context_without_contexts_counts_globally() {
        let units = words("a b a c");
        let table = count_in_context(UnitSpec::new(&units), ContextGroupSpec::default());
        let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
        assert_eq!(t.get(&label_of(GLOBAL_CONTEXT), &label_of("a")), Some(2));
        assert_eq!(t.get(&label_of(GLOBAL_CONTEXT), &label_of("b")), Some(1));
    }

    #[test]
    fn count_in_window_slides_and_updates_incrementally() {
        let units = words("a b a c");
        let table = count_in_window(UnitSpec::new(&units), 2);
        let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
        assert_eq!(t.row_ids.len(), 3);
        assert_eq!(t.get(&label_of("1"), &label_of("a")), Some(1));
        assert_eq!(t.get(&label_of("1"), &label_of("b")), Some(1));
        assert_eq!(t.get(&label_of("2"), &label_of("a")), Some(1));
        assert_eq!(t.get(&label_of("3"), &label_of("a")), Some(1));
        assert_eq!(t.get(&label_of("3"), &label_of("c")), Some(1));
    }

    #[test]
    fn count_in_chain_builds_left_right_context_keys() {
        let units = words("a b c d");
        let table = count_in_chain(
            UnitSpec::new(&units),
            ChainContextSpec {
                left_size: 1,
                right_size: 1,
                unit_pos_marker: "_",
                merge_strings: false,
            },
        );
        let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
        assert_eq!(t.get(&label_of("a_c"), &label_of("b")), Some(1));
        assert_eq!(t.get(&label_of("b_d"), &label_of("c")), Some(1));
    }
}
