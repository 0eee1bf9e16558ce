use super::{CellValue, ColumnType, FlatCrosstab, IntPivotCrosstab, Label, PivotCrosstab, TableHeader};

/// The "weighted and flat" shape: one row per distinct (unit, context)
/// pair plus its count, continuous-valued. Grounded on
/// `LTTL/Table.py::WeightedFlatCrosstab`.
#[derive(Debug, Clone)]
pub struct WeightedFlatCrosstab {
    pub row_ids: Vec<usize>,
    pub col_ids: Vec<Label>,
    rows: Vec<(Label, Label, f64)>,
    pub header: TableHeader,
}

impl WeightedFlatCrosstab {
    pub fn new(column_col: impl Into<String>, row_col: Option<String>, rows: Vec<(Label, Label, f64)>) -> Self {
        let column_col = column_col.into();
        let mut col_ids = vec![Label::Str(column_col.clone())];
        if let Some(row_col) = &row_col {
            col_ids.push(Label::Str(row_col.clone()));
        }
        col_ids.push(Label::Str("__weight__".to_string()));

        let mut header = TableHeader {
            header_col_id: "__id__".to_string(),
            header_col_type: ColumnType::Continuous,
            ..TableHeader::default()
        };
        for col in &col_ids[..col_ids.len() - 1] {
            header.col_type.insert(col.to_string(), ColumnType::Discrete);
        }
        header.col_type.insert("__weight__".to_string(), ColumnType::Continuous);

        let row_ids = (1..=rows.len()).collect();
        Self {
            row_ids,
            col_ids,
            rows,
            header,
        }
    }

    pub fn get(&self, row: usize, col: &Label) -> CellValue {
        let Some((c0, c1, weight)) = self.rows.get(row.checked_sub(1).unwrap_or(usize::MAX)) else {
            return CellValue::Missing;
        };
        if *col == self.col_ids[0] {
            CellValue::Str(c0.to_string())
        } else if self.col_ids.len() == 3 && *col == self.col_ids[1] {
            CellValue::Str(c1.to_string())
        } else if *col == *self.col_ids.last().unwrap() {
            CellValue::Float(*weight)
        } else {
            CellValue::Missing
        }
    }

    pub fn to_pivot(&self, progress_callback: Option<&dyn Fn()>) -> PivotCrosstab {
        let mut row_ids: Vec<Label> = self.rows.iter().map(|(_, r, _)| r.clone()).collect();
        row_ids.sort();
        row_ids.dedup();
        let mut col_ids: Vec<Label> = self.rows.iter().map(|(c, _, _)| c.clone()).collect();
        col_ids.sort();
        col_ids.dedup();

        let header = TableHeader {
            header_row_id: self.col_ids.get(1).map(|l| l.to_string()).unwrap_or_default(),
            header_row_type: ColumnType::Discrete,
            header_col_id: self.col_ids[0].to_string(),
            header_col_type: ColumnType::Discrete,
            col_type: col_ids.iter().map(|c| (c.to_string(), ColumnType::Continuous)).collect(),
            class_col_id: None,
        };
        let mut out = PivotCrosstab::new(row_ids, col_ids, header);
        for (col, row, weight) in &self.rows {
            out.set(row.clone(), col.clone(), *weight);
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        out
    }
}

/// Same shape, with integer weights -- the direct output of
/// `IntPivotCrosstab::to_weighted_flat` and `FlatCrosstab::to_weighted_flat`.
#[derive(Debug, Clone)]
pub struct IntWeightedFlatCrosstab {
    pub row_ids: Vec<usize>,
    pub col_ids: Vec<Label>,
    rows: Vec<(Label, Label, i64)>,
    pub header: TableHeader,
}

impl IntWeightedFlatCrosstab {
    pub fn new(column_col: impl Into<String>, row_col: Option<String>, rows: Vec<(Label, Label, i64)>) -> Self {
        let column_col = column_col.into();
        let mut col_ids = vec![Label::Str(column_col.clone())];
        if let Some(row_col) = &row_col {
            col_ids.push(Label::Str(row_col.clone()));
        }
        col_ids.push(Label::Str("__weight__".to_string()));

        let mut header = TableHeader {
            header_col_id: "__id__".to_string(),
            header_col_type: ColumnType::Continuous,
            ..TableHeader::default()
        };
        for col in &col_ids[..col_ids.len() - 1] {
            header.col_type.insert(col.to_string(), ColumnType::Discrete);
        }
        header.col_type.insert("__weight__".to_string(), ColumnType::Continuous);

        let row_ids = (1..=rows.len()).collect();
        Self {
            row_ids,
            col_ids,
            rows,
            header,
        }
    }

    pub fn get(&self, row: usize, col: &Label) -> CellValue {
        let Some((c0, c1, weight)) = self.rows.get(row.checked_sub(1).unwrap_or(usize::MAX)) else {
            return CellValue::Missing;
        };
        if *col == self.col_ids[0] {
            CellValue::Str(c0.to_string())
        } else if self.col_ids.len() == 3 && *col == self.col_ids[1] {
            CellValue::Str(c1.to_string())
        } else if *col == *self.col_ids.last().unwrap() {
            CellValue::Int(*weight)
        } else {
            CellValue::Missing
        }
    }

    pub fn to_pivot(&self, progress_callback: Option<&dyn Fn()>) -> IntPivotCrosstab {
        let mut row_ids: Vec<Label> = self.rows.iter().map(|(_, r, _)| r.clone()).collect();
        row_ids.sort();
        row_ids.dedup();
        let mut col_ids: Vec<Label> = self.rows.iter().map(|(c, _, _)| c.clone()).collect();
        col_ids.sort();
        col_ids.dedup();

        let header = TableHeader {
            header_row_id: self.col_ids.get(1).map(|l| l.to_string()).unwrap_or_default(),
            header_row_type: ColumnType::Discrete,
            header_col_id: self.col_ids[0].to_string(),
            header_col_type: ColumnType::Discrete,
            col_type: col_ids.iter().map(|c| (c.to_string(), ColumnType::Continuous)).collect(),
            class_col_id: None,
        };
        let mut out = IntPivotCrosstab::new(row_ids, col_ids, header);
        for (col, row, weight) in &self.rows {
            out.set(row.clone(), col.clone(), *weight);
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        out
    }

    pub fn to_flat(&self, progress_callback: Option<&dyn Fn()>) -> FlatCrosstab {
        let unit_col = self.col_ids[0].to_string();
        let context_col = self.col_ids.get(1).map(|l| l.to_string()).unwrap_or_default();
        let mut rows = Vec::new();
        for (col, row, weight) in &self.rows {
            for _ in 0..(*weight).max(0) {
                rows.push((col.clone(), row.clone()));
            }
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        FlatCrosstab::new(unit_col, context_col, rows)
    }
}
