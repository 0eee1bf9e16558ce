use super::{ColumnType, IntPivotCrosstab, IntWeightedFlatCrosstab, Label, TableHeader};

/// The "flat" crosstab shape: one row per (unit, context) occurrence,
/// row ids are just `1..N`. Grounded on `LTTL/Table.py::FlatCrosstab`.
#[derive(Debug, Clone)]
pub struct FlatCrosstab {
    pub row_ids: Vec<usize>,
    pub col_ids: [Label; 2],
    rows: Vec<(Label, Label)>,
    pub header: TableHeader,
}

impl FlatCrosstab {
    pub fn new(unit_col: impl Into<String>, context_col: impl Into<String>, rows: Vec<(Label, Label)>) -> Self {
        let unit_col = unit_col.into();
        let context_col = context_col.into();
        let row_ids = (1..=rows.len()).collect();
        let mut header = TableHeader {
            header_col_id: "__id__".to_string(),
            header_col_type: ColumnType::String,
            ..TableHeader::default()
        };
        header.col_type.insert(unit_col.clone(), ColumnType::Discrete);
        header.col_type.insert(context_col.clone(), ColumnType::Discrete);
        Self {
            row_ids,
            col_ids: [Label::Str(unit_col), Label::Str(context_col)],
            rows,
            header,
        }
    }

    /// `col` must be one of `col_ids[0]`/`col_ids[1]`; returns the
    /// corresponding element of row `row` (1-based, as in the source).
    pub fn get(&self, row: usize, col: &Label) -> Option<Label> {
        let (c0, r0) = self.rows.get(row.checked_sub(1)?)?;
        if *col == self.col_ids[0] {
            Some(c0.clone())
        } else if *col == self.col_ids[1] {
            Some(r0.clone())
        } else {
            None
        }
    }

    /// Counts repeated (unit, context) pairs into an `IntPivotCrosstab`.
    pub fn to_pivot(&self, progress_callback: Option<&dyn Fn()>) -> IntPivotCrosstab {
        let mut row_ids: Vec<Label> = self.rows.iter().map(|(_, r)| r.clone()).collect();
        row_ids.sort();
        row_ids.dedup();
        let mut col_ids: Vec<Label> = self.rows.iter().map(|(c, _)| c.clone()).collect();
        col_ids.sort();
        col_ids.dedup();

        let header = TableHeader {
            header_row_id: self.col_ids[1].to_string(),
            header_row_type: ColumnType::Discrete,
            header_col_id: self.col_ids[0].to_string(),
            header_col_type: ColumnType::Discrete,
            col_type: col_ids.iter().map(|c| (c.to_string(), ColumnType::Continuous)).collect(),
            class_col_id: None,
        };
        let mut out = IntPivotCrosstab::new(row_ids, col_ids, header);
        for (col, row) in &self.rows {
            out.increment(row.clone(), col.clone());
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        out
    }

    /// Collapses consecutive identical (unit, context) rows into a
    /// single weighted row. Relies on the same adjacency property the
    /// source documents: rows sharing a (unit, context) pair are always
    /// produced consecutively by `to_flat`.
    pub fn to_weighted_flat(&self, progress_callback: Option<&dyn Fn()>) -> IntWeightedFlatCrosstab {
        let mut collapsed: Vec<(Label, Label, i64)> = Vec::new();
        for (col, row) in &self.rows {
            if let Some(last) = collapsed.last_mut() {
                if last.0 == *col && last.1 == *row {
                    last.2 += 1;
                    if let Some(cb) = progress_callback {
                        cb();
                    }
                    continue;
                }
            }
            collapsed.push((col.clone(), row.clone(), 1));
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        IntWeightedFlatCrosstab::new(self.col_ids[0].to_string(), Some(self.col_ids[1].to_string()), collapsed)
    }
}
