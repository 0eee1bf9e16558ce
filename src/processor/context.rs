use crate::collections::HashMap;
use crate::segmentation::Segmentation;
use crate::store;
use crate::table::{CellValue, ColumnType, Label, RecordTable, Table, TableHeader};

/// Concordance rooted in a containing segmentation: units, and
/// contexts that enclose them.
pub struct ContextSpec<'a> {
    pub unit_segmentation: &'a Segmentation,
    pub unit_annotation_key: Option<&'a str>,
    pub separate_annotation: bool,
    pub context_segmentation: &'a Segmentation,
    pub context_annotation_key: Option<&'a str>,
    pub max_num_chars: Option<usize>,
}

impl<'a> ContextSpec<'a> {
    pub fn new(unit_segmentation: &'a Segmentation, context_segmentation: &'a Segmentation) -> Self {
        Self {
            unit_segmentation,
            unit_annotation_key: None,
            separate_annotation: true,
            context_segmentation,
            context_annotation_key: None,
            max_num_chars: None,
        }
    }
}

/// One unit occurrence within a context, carrying whichever immediate
/// left/right snippets and annotations apply to it.
#[derive(Debug, Clone)]
pub struct ConcordanceRow {
    pub pos: i64,
    pub left: Option<String>,
    pub key_segment: String,
    pub right: Option<String>,
    pub unit_annotation: Option<String>,
    pub context_annotation: Option<String>,
}

fn substring_of(str_index: usize, start: usize, end: usize) -> String {
    let s = store::resolve(str_index);
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// One row per unit occurrence contained in a context, with the
/// immediate left/right text around it (bounded by `max_num_chars`, or
/// by the context's own boundaries when unset).
///
/// Grounded on `Processor.py::context`.
pub fn context(spec: ContextSpec) -> Table {
    let mut rows: Vec<ConcordanceRow> = Vec::new();

    for (context_index, context_segment) in spec.context_segmentation.iter().enumerate() {
        let context_annotation = spec.context_annotation_key.map(|k| context_segment.annotation_or_none(k).to_string());
        let max_len = spec.max_num_chars.unwrap_or_else(|| context_segment.content().chars().count());
        let context_start = context_segment.start_or_zero();
        let context_end = context_segment.end_or_len();

        for unit_index in context_segment.get_contained_segment_indices(spec.unit_segmentation) {
            let unit_token = spec.unit_segmentation.get(unit_index);

            let mut key_segment = unit_token.content();
            let mut unit_annotation = None;
            if let Some(key) = spec.unit_annotation_key {
                let value = unit_token.annotation_or_none(key).to_string();
                if spec.separate_annotation {
                    unit_annotation = Some(value);
                } else {
                    key_segment = value;
                }
            }

            let unit_start = unit_token.start_or_zero();
            let unit_end = unit_token.end_or_len();

            let left = if context_start < unit_start {
                let imm_left_start = context_start.max(unit_start.saturating_sub(max_len));
                (unit_start > imm_left_start).then(|| substring_of(unit_token.str_index, imm_left_start, unit_start))
            } else {
                None
            };
            let right = if context_end > unit_end {
                let imm_right_end = context_end.min(unit_end + max_len);
                (imm_right_end > unit_end).then(|| substring_of(unit_token.str_index, unit_end, imm_right_end))
            } else {
                None
            };

            rows.push(ConcordanceRow {
                pos: context_index as i64 + 1,
                left,
                key_segment,
                right,
                unit_annotation,
                context_annotation: context_annotation.clone(),
            });
        }
    }

    let has_imm_left = rows.iter().any(|r| r.left.is_some());
    let has_imm_right = rows.iter().any(|r| r.right.is_some());

    let mut col_ids = vec!["__pos__".to_string()];
    if has_imm_left {
        col_ids.push("__left__".to_string());
    }
    col_ids.push("__key_segment__".to_string());
    if has_imm_right {
        col_ids.push("__right__".to_string());
    }
    if let Some(key) = spec.unit_annotation_key {
        if spec.separate_annotation {
            col_ids.push(key.to_string());
        }
    }
    if let Some(key) = spec.context_annotation_key {
        col_ids.push(key.to_string());
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
        if let Some(l) = row.left {
            table.set(label.clone(), "__left__", CellValue::Str(l));
        }
        table.set(label.clone(), "__key_segment__", CellValue::Str(row.key_segment));
        if let Some(r) = row.right {
            table.set(label.clone(), "__right__", CellValue::Str(r));
        }
        if let (Some(key), Some(v)) = (spec.unit_annotation_key, row.unit_annotation) {
            if spec.separate_annotation {
                table.set(label.clone(), key, CellValue::Str(v));
            }
        }
        if let (Some(key), Some(v)) = (spec.context_annotation_key, row.context_annotation) {
            table.set(label.clone(), key, CellValue::Str(v));
        }
    }
    Table::Record(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

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
    fn context_reports_immediate_left_and_right_text() {
        let units = words("the quick brown fox");
        let contexts = sentences("the quick brown fox", &[(0, 19)]);
        let mut spec = ContextSpec::new(&units, &contexts);
        spec.max_num_chars = Some(6);
        let Table::Record(t) = context(spec) else { panic!("expected Record") };
        assert_eq!(t.row_ids.len(), 4);
        assert_eq!(t.get(&Label::Int(2), "__key_segment__"), Some(&CellValue::Str("quick".to_string())));
    }
}
