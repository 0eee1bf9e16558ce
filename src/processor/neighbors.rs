use crate::collections::HashMap;
use crate::segmentation::Segmentation;
use crate::table::{CellValue, ColumnType, Label, RecordTable, Table, TableHeader};

/// The unit half of `neighbors`: which segmentation to look for, and
/// whether its annotation (if any) gets its own column.
pub struct NeighborsUnits<'a> {
    pub segmentation: &'a Segmentation,
    pub annotation_key: Option<&'a str>,
    pub separate_annotation: bool,
}

impl<'a> NeighborsUnits<'a> {
    pub fn new(segmentation: &'a Segmentation) -> Self {
        Self {
            segmentation,
            annotation_key: None,
            separate_annotation: true,
        }
    }
}

/// The context half of `neighbors`: the segmentation whose segments are
/// "positions" (neighbors are counted in terms of these), how far out
/// to look, and whether segments from different underlying strings may
/// be neighbors.
pub struct NeighborsContexts<'a> {
    pub segmentation: &'a Segmentation,
    pub annotation_key: Option<&'a str>,
    pub max_distance: Option<usize>,
    pub merge_strings: bool,
}

impl<'a> NeighborsContexts<'a> {
    pub fn new(segmentation: &'a Segmentation) -> Self {
        Self {
            segmentation,
            annotation_key: None,
            max_distance: None,
            merge_strings: false,
        }
    }
}

/// One unit occurrence, with the context-segment text (or annotation)
/// found at each neighboring position to its left and right.
#[derive(Debug, Clone)]
pub struct NeighborRow {
    pub pos: i64,
    pub key_segment: String,
    pub unit_annotation: Option<String>,
    pub left: HashMap<usize, String>,
    pub right: HashMap<usize, String>,
}

/// For each unit occurrence, the content (or annotation) of its
/// neighboring context segments at every distance up to `max_distance`
/// (or up to the whole context segmentation when unset).
///
/// Grounded on `Processor.py::neighbors`.
pub fn neighbors(units: NeighborsUnits, contexts: NeighborsContexts) -> Table {
    let adjacent_positions: Vec<usize> = match contexts.max_distance {
        Some(d) => (1..=d).collect(),
        None => (1..contexts.segmentation.len()).collect(),
    };

    let mut rows: Vec<NeighborRow> = Vec::new();

    for (context_index, context_segment) in contexts.segmentation.iter().enumerate() {
        for unit_index in context_segment.get_contained_segment_indices(units.segmentation) {
            let unit_token = units.segmentation.get(unit_index);

            let mut key_segment = unit_token.content();
            let mut unit_annotation = None;
            if let Some(key) = units.annotation_key {
                let value = unit_token.annotation_or_none(key).to_string();
                if units.separate_annotation {
                    unit_annotation = Some(value);
                } else {
                    key_segment = value;
                }
            }

            let unit_str_index = unit_token.real_str_index();
            let mut left = HashMap::default();
            let mut right = HashMap::default();

            for &pos in &adjacent_positions {
                if pos <= context_index {
                    let left_token = contexts.segmentation.get(context_index - pos);
                    if contexts.merge_strings || unit_str_index == left_token.real_str_index() {
                        let value = match contexts.annotation_key {
                            Some(key) => left_token.annotation_or_none(key).to_string(),
                            None => left_token.content(),
                        };
                        left.insert(pos, value);
                    }
                }
                let right_index = context_index + pos;
                if right_index < contexts.segmentation.len() {
                    let right_token = contexts.segmentation.get(right_index);
                    if contexts.merge_strings || unit_str_index == right_token.real_str_index() {
                        let value = match contexts.annotation_key {
                            Some(key) => right_token.annotation_or_none(key).to_string(),
                            None => right_token.content(),
                        };
                        right.insert(pos, value);
                    }
                }
            }

            rows.push(NeighborRow {
                pos: context_index as i64 + 1,
                key_segment,
                unit_annotation,
                left,
                right,
            });
        }
    }

    let mut col_ids = vec!["__pos__".to_string()];
    for p in adjacent_positions.iter().rev() {
        col_ids.push(format!("{p}L"));
    }
    col_ids.push("__key_segment__".to_string());
    for p in &adjacent_positions {
        col_ids.push(format!("{p}R"));
    }
    if let Some(key) = units.annotation_key {
        if units.separate_annotation {
            col_ids.push(key.to_string());
        }
    }

    let mut col_type = HashMap::default();
    for c in &col_ids {
        col_type.insert(c.clone(), ColumnType::String);
    }
    col_type.insert("__pos__".to_string(), ColumnType::Continuous);
    let header = TableHeader {
        header_row_id: "__id__".to_string(),
        header_row_type: ColumnType::Continuous,
        header_col_id: "__col__".to_string(),
        header_col_type: ColumnType::String,
        col_type,
        class_col_id: None,
    };

    let row_ids: Vec<Label> = (1..=rows.len() as i64).map(Label::Int).collect();
    let mut table = RecordTable::new(row_ids, col_ids, header);
    for (i, row) in rows.into_iter().enumerate() {
        let label = Label::Int(i as i64 + 1);
        table.set(label.clone(), "__pos__", CellValue::Int(row.pos));
        for (p, v) in row.left {
            table.set(label.clone(), format!("{p}L"), CellValue::Str(v));
        }
        table.set(label.clone(), "__key_segment__", CellValue::Str(row.key_segment));
        for (p, v) in row.right {
            table.set(label.clone(), format!("{p}R"), CellValue::Str(v));
        }
        if let (Some(key), Some(v)) = (units.annotation_key, row.unit_annotation) {
            if units.separate_annotation {
                table.set(label.clone(), key, CellValue::Str(v));
            }
        }
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
    fn neighbors_reports_adjacent_context_segments() {
        let units = words("a b c d e");
        let table = neighbors(NeighborsUnits::new(&units), NeighborsContexts::new(&units));
        let Table::Record(t) = table else { panic!("expected Record") };
        assert_eq!(t.row_ids.len(), 5);
        assert_eq!(t.get(&Label::Int(3), "1L"), Some(&CellValue::Str("b".to_string())));
        assert_eq!(t.get(&Label::Int(3), "1R"), Some(&CellValue::Str("d".to_string())));
    }
}
