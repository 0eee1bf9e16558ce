use crate::collections::{HashMap, HashSet};
use crate::segmentation::Segmentation;
use crate::table::{CellValue, ColumnType, Label, RecordTable, Table, TableHeader};

/// The context half of `collocations`: the segmentation whose segments
/// are candidate neighbor types, how far out to look for neighbors, the
/// minimum global frequency a type needs to be reported, and whether
/// segments from different underlying strings may be neighbors.
pub struct CollocationsSpec<'a> {
    pub segmentation: &'a Segmentation,
    pub annotation_key: Option<&'a str>,
    pub max_distance: Option<usize>,
    pub min_frequency: u64,
    pub merge_strings: bool,
}

impl<'a> CollocationsSpec<'a> {
    pub fn new(segmentation: &'a Segmentation) -> Self {
        Self {
            segmentation,
            annotation_key: None,
            max_distance: None,
            min_frequency: 1,
            merge_strings: false,
        }
    }
}

/// A candidate collocate type's local (near a unit occurrence) vs.
/// global frequency, and the resulting pointwise mutual information.
#[derive(Debug, Clone)]
pub struct CollocationRow {
    pub unit: String,
    pub mutual_info: f64,
    pub local_freq: u64,
    pub local_prob: f64,
    pub global_freq: u64,
    pub global_prob: f64,
}

/// For every context-segment type that appears as a neighbor of some
/// unit occurrence, compares how often it appears *near* units (local
/// frequency) against how often it appears overall (global frequency),
/// summarized as pointwise mutual information.
///
/// Grounded on `Processor.py::collocations`.
pub fn collocations(units: &Segmentation, contexts: CollocationsSpec) -> Table {
    let adjacent_positions: Vec<usize> = match contexts.max_distance {
        Some(d) => (1..=d).collect(),
        None => (1..contexts.segmentation.len()).collect(),
    };

    let context_list: Vec<String> = contexts
        .segmentation
        .iter()
        .map(|c| match contexts.annotation_key {
            Some(key) => c.annotation_or_none(key).to_string(),
            None => c.content(),
        })
        .collect();

    let mut global_freq: HashMap<String, u64> = HashMap::default();
    let mut neighbor_indices: HashSet<usize> = HashSet::default();

    for (context_index, context_segment) in contexts.segmentation.iter().enumerate() {
        *global_freq.entry(context_list[context_index].clone()).or_insert(0) += 1;

        for unit_index in context_segment.get_contained_segment_indices(units) {
            let unit_str_index = units.get(unit_index).real_str_index();

            for &pos in &adjacent_positions {
                if pos <= context_index {
                    let left_index = context_index - pos;
                    if contexts.merge_strings || unit_str_index == contexts.segmentation.get(left_index).real_str_index() {
                        neighbor_indices.insert(left_index);
                    }
                }
                let right_index = context_index + pos;
                if right_index < contexts.segmentation.len()
                    && (contexts.merge_strings || unit_str_index == contexts.segmentation.get(right_index).real_str_index())
                {
                    neighbor_indices.insert(right_index);
                }
            }
        }
    }

    let mut local_freq: HashMap<String, u64> = HashMap::default();
    for &i in &neighbor_indices {
        *local_freq.entry(context_list[i].clone()).or_insert(0) += 1;
    }

    let mut neighbor_types: Vec<String> = local_freq.keys().cloned().collect();
    neighbor_types.sort();
    if contexts.min_frequency > 1 {
        neighbor_types.retain(|t| *global_freq.get(t).unwrap_or(&0) >= contexts.min_frequency);
    }

    let local_total_count: u64 = neighbor_types.iter().map(|t| local_freq[t]).sum();
    let global_total_count: u64 = global_freq.values().sum();

    let rows: Vec<CollocationRow> = neighbor_types
        .iter()
        .map(|t| {
            let local_prob = local_freq[t] as f64 / local_total_count as f64;
            let global_prob = global_freq[t] as f64 / global_total_count as f64;
            CollocationRow {
                unit: t.clone(),
                mutual_info: (local_prob / global_prob).log2(),
                local_freq: local_freq[t],
                local_prob,
                global_freq: global_freq[t],
                global_prob,
            }
        })
        .collect();

    let col_ids: Vec<String> = ["__mutual_info__", "__local_freq__", "__local_prob__", "__global_freq__", "__global_prob__"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut col_type = HashMap::default();
    for c in &col_ids {
        col_type.insert(c.clone(), ColumnType::Continuous);
    }
    let header = TableHeader {
        header_row_id: "__unit__".to_string(),
        header_row_type: ColumnType::String,
        header_col_id: "__col__".to_string(),
        header_col_type: ColumnType::String,
        col_type,
        class_col_id: None,
    };

    let row_ids: Vec<Label> = neighbor_types.iter().map(|t| Label::Str(t.clone())).collect();
    let mut table = RecordTable::new(row_ids, col_ids, header);
    for row in rows {
        let label = Label::Str(row.unit);
        table.set(label.clone(), "__mutual_info__", CellValue::Float(row.mutual_info));
        table.set(label.clone(), "__local_freq__", CellValue::Int(row.local_freq as i64));
        table.set(label.clone(), "__local_prob__", CellValue::Float(row.local_prob));
        table.set(label.clone(), "__global_freq__", CellValue::Int(row.global_freq as i64));
        table.set(label.clone(), "__global_prob__", CellValue::Float(row.global_prob));
    }
    Table::Record(table)
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
    fn collocations_reports_local_vs_global_frequency() {
        let words_seg = words("a b a c a d");
        let table = collocations(&words_seg, CollocationsSpec::new(&words_seg));
        let Table::Record(t) = table else { panic!("expected Record") };
        assert!(t.row_ids.contains(&Label::Str("b".to_string())));
        let mi = t.get(&Label::Str("b".to_string()), "__mutual_info__");
        assert!(mi.is_some());
    }
}
