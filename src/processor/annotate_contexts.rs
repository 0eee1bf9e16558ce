use crate::collections::HashMap;
use crate::table::{CellValue, ColumnType, IntPivotCrosstab, Label, RecordTable, Table, TableHeader};

use super::{count_in_context, ContextGroupSpec, UnitSpec};

/// How to order the unit types found in a context before collapsing
/// them into a single annotation value.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Sort by frequency within the context (most frequent first when
    /// `reverse` is set).
    Frequency,
    /// Sort by the unit type string itself.
    Ascii,
}

/// Knobs controlling how multiple unit types found in the same context
/// get collapsed into the single `__annotation__` value reported for
/// that context.
pub struct MultipleValuesSpec<'a> {
    pub sort_order: TieBreak,
    pub reverse: bool,
    pub keep_only_first: bool,
    pub value_delimiter: &'a str,
}

impl Default for MultipleValuesSpec<'_> {
    fn default() -> Self {
        Self {
            sort_order: TieBreak::Frequency,
            reverse: true,
            keep_only_first: true,
            value_delimiter: "|",
        }
    }
}

/// Knobs for `annotate_contexts`: which units to count, how to collapse
/// multiple values per context, and which contexts to annotate.
pub struct AnnotateContextsSpec<'a> {
    pub units: UnitSpec<'a>,
    pub multiple_values: MultipleValuesSpec<'a>,
    pub contexts: ContextGroupSpec<'a>,
}

fn row_dict(table: &IntPivotCrosstab, row_id: &Label) -> HashMap<String, i64> {
    table
        .col_ids
        .iter()
        .filter_map(|c| table.get(row_id, c).map(|v| (c.to_string(), v)))
        .collect()
}

/// For each context, counts the unit types it contains and collapses
/// them into a single annotation value: the most (or least) frequent
/// type, or all of them joined by a delimiter.
///
/// Grounded on `Processor.py::annotate_contexts`.
pub fn annotate_contexts(spec: AnnotateContextsSpec) -> Table {
    let Table::IntPivot(counts) = count_in_context(spec.units, spec.contexts) else {
        unreachable!("count_in_context always returns IntPivot")
    };
    let multiple_values = spec.multiple_values;

    let mut values: HashMap<(Label, String), CellValue> = HashMap::default();
    for row_id in &counts.row_ids {
        let row = row_dict(&counts, row_id);
        let mut annotations: Vec<String> = row.keys().cloned().collect();
        match multiple_values.sort_order {
            TieBreak::Frequency => {
                annotations.sort_by(|a, b| row[a].cmp(&row[b]));
            }
            TieBreak::Ascii => {
                annotations.sort();
            }
        }
        if multiple_values.reverse {
            annotations.reverse();
        }

        let annotation = if multiple_values.keep_only_first {
            annotations.into_iter().next().unwrap_or_default()
        } else {
            annotations.join(multiple_values.value_delimiter)
        };
        values.insert((row_id.clone(), "__annotation__".to_string()), CellValue::Str(annotation));
    }

    let mut col_type = HashMap::default();
    col_type.insert("__annotation__".to_string(), ColumnType::Discrete);
    let header = TableHeader {
        header_row_id: counts.header.header_row_id.clone(),
        header_row_type: counts.header.header_row_type,
        header_col_id: "__col__".to_string(),
        header_col_type: ColumnType::String,
        col_type,
        class_col_id: Some("__annotation__".to_string()),
    };

    let mut table = RecordTable::new(counts.row_ids.clone(), vec!["__annotation__".to_string()], header);
    for ((row, col), value) in values {
        table.set(row, col, value);
    }
    Table::Record(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::segmentation::Segmentation;
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

    fn sentences(text: &str, splits: &[(usize, usize)]) -> Segmentation {
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("sentences");
        for &(start, end) in splits {
            seg.append(Segment::new(str_index, Some(start), Some(end)));
        }
        seg
    }

    #[test]
    fn annotate_contexts_keeps_most_frequent_unit_by_default() {
        let units = words("a a b");
        let contexts = sentences("a a b", &[(0, 5)]);
        let spec = AnnotateContextsSpec {
            units: UnitSpec::new(&units),
            multiple_values: MultipleValuesSpec::default(),
            contexts: ContextGroupSpec {
                segmentation: Some(&contexts),
                annotation_key: None,
                merge: false,
            },
        };
        let Table::Record(t) = annotate_contexts(spec) else { panic!("expected Record") };
        assert_eq!(t.row_ids.len(), 1);
        let row = t.row_ids[0].clone();
        assert_eq!(t.get(&row, "__annotation__"), Some(&CellValue::Str("a".to_string())));
    }

    #[test]
    fn annotate_contexts_joins_all_values_when_not_keeping_only_first() {
        let units = words("a b");
        let contexts = sentences("a b", &[(0, 3)]);
        let spec = AnnotateContextsSpec {
            units: UnitSpec::new(&units),
            multiple_values: MultipleValuesSpec {
                keep_only_first: false,
                sort_order: TieBreak::Ascii,
                reverse: false,
                value_delimiter: "|",
            },
            contexts: ContextGroupSpec {
                segmentation: Some(&contexts),
                annotation_key: None,
                merge: false,
            },
        };
        let Table::Record(t) = annotate_contexts(spec) else { panic!("expected Record") };
        let row = t.row_ids[0].clone();
        assert_eq!(t.get(&row, "__annotation__"), Some(&CellValue::Str("a|b".to_string())));
    }
}
