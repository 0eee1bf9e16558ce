use crate::collections::HashMap;

use super::{CellValue, ColumnType, FlatCrosstab, IntWeightedFlatCrosstab, Label, TableHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMode {
    Rows,
    Columns,
    Table,
    PresenceAbsence,
    Quotients,
    TfIdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationType {
    L1,
    L2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationBias {
    Frequent,
    None,
    Rare,
}

/// A sparse contingency table keyed by `(row_id, col_id)`, continuous
/// (`f64`) cell values. The Python source backs this with a
/// `scipy.sparse.dok_matrix`; a plain `HashMap` keyed on the id pair
/// plays the same role without pulling in a sparse-linear-algebra
/// dependency the rest of the crate has no other use for.
#[derive(Debug, Clone)]
pub struct PivotCrosstab {
    pub row_ids: Vec<Label>,
    pub col_ids: Vec<Label>,
    pub values: HashMap<(Label, Label), f64>,
    pub header: TableHeader,
}

impl PivotCrosstab {
    pub fn new(row_ids: Vec<Label>, col_ids: Vec<Label>, header: TableHeader) -> Self {
        Self {
            row_ids,
            col_ids,
            values: HashMap::default(),
            header,
        }
    }

    pub fn set(&mut self, row: Label, col: Label, value: f64) {
        self.values.insert((row, col), value);
    }

    pub fn get(&self, row: &Label, col: &Label) -> Option<f64> {
        self.values.get(&(row.clone(), col.clone())).copied()
    }

    pub fn to_transposed(&self) -> PivotCrosstab {
        let mut out = PivotCrosstab::new(
            self.col_ids.clone(),
            self.row_ids.clone(),
            TableHeader {
                header_row_id: self.header.header_col_id.clone(),
                header_row_type: self.header.header_col_type,
                header_col_id: self.header.header_row_id.clone(),
                header_col_type: self.header.header_row_type,
                col_type: self.row_ids.iter().map(|r| (r.to_string(), ColumnType::Continuous)).collect(),
                class_col_id: None,
            },
        );
        for ((row, col), &value) in &self.values {
            out.set(col.clone(), row.clone(), value);
        }
        out
    }

    pub fn to_string_tsv(&self) -> String {
        super::Table::Pivot(self.clone()).to_string_tsv()
    }
}

/// The integer-valued pivot crosstab produced by `count_in_context`/
/// `count_in_window`/`count_in_chain` -- the workhorse table shape that
/// normalization, association-matrix derivation and flattening all
/// start from.
#[derive(Debug, Clone)]
pub struct IntPivotCrosstab {
    pub row_ids: Vec<Label>,
    pub col_ids: Vec<Label>,
    pub values: HashMap<(Label, Label), i64>,
    pub header: TableHeader,
}

impl IntPivotCrosstab {
    pub fn new(row_ids: Vec<Label>, col_ids: Vec<Label>, header: TableHeader) -> Self {
        Self {
            row_ids,
            col_ids,
            values: HashMap::default(),
            header,
        }
    }

    pub fn increment(&mut self, row: Label, col: Label) {
        *self.values.entry((row, col)).or_insert(0) += 1;
    }

    pub fn set(&mut self, row: Label, col: Label, value: i64) {
        self.values.insert((row, col), value);
    }

    pub fn get(&self, row: &Label, col: &Label) -> Option<i64> {
        self.values.get(&(row.clone(), col.clone())).copied()
    }

    fn dense(&self) -> Vec<Vec<f64>> {
        self.row_ids
            .iter()
            .map(|r| {
                self.col_ids
                    .iter()
                    .map(|c| self.get(r, c).unwrap_or(0) as f64)
                    .collect()
            })
            .collect()
    }

    pub fn to_transposed(&self) -> IntPivotCrosstab {
        let mut out = IntPivotCrosstab::new(
            self.col_ids.clone(),
            self.row_ids.clone(),
            TableHeader {
                header_row_id: self.header.header_col_id.clone(),
                header_row_type: self.header.header_col_type,
                header_col_id: self.header.header_row_id.clone(),
                header_col_type: self.header.header_row_type,
                col_type: self.row_ids.iter().map(|r| (r.to_string(), ColumnType::Continuous)).collect(),
                class_col_id: None,
            },
        );
        for ((row, col), &value) in &self.values {
            out.set(col.clone(), row.clone(), value);
        }
        out
    }

    /// Normalizes the table per `mode`; see each arm for the exact
    /// statistic computed. `presence/absence` is the only mode that
    /// stays integer-valued, so it alone returns an `IntPivotCrosstab`;
    /// every other mode returns a continuous `PivotCrosstab`.
    pub fn to_normalized(&self, mode: NormalizationMode, norm_type: NormalizationType) -> NormalizedTable {
        let dense = self.dense();
        let num_rows = self.row_ids.len();
        let num_cols = self.col_ids.len();

        let sum_row: Vec<f64> = dense.iter().map(|row| row.iter().sum()).collect();
        let sum_col: Vec<f64> = (0..num_cols)
            .map(|j| (0..num_rows).map(|i| dense[i][j]).sum())
            .collect();
        let sum_sq_row: Vec<f64> = dense.iter().map(|row| row.iter().map(|v| v * v).sum()).collect();
        let sum_sq_col: Vec<f64> = (0..num_cols)
            .map(|j| (0..num_rows).map(|i| dense[i][j] * dense[i][j]).sum())
            .collect();
        let total: f64 = sum_row.iter().sum();

        let safe_div = |n: f64, d: f64| -> f64 { if d == 0.0 { 0.0 } else { n / d } };

        match mode {
            NormalizationMode::PresenceAbsence => {
                let mut out = IntPivotCrosstab::new(self.row_ids.clone(), self.col_ids.clone(), self.header.clone());
                for i in 0..num_rows {
                    for j in 0..num_cols {
                        if dense[i][j] != 0.0 {
                            out.set(self.row_ids[i].clone(), self.col_ids[j].clone(), 1);
                        }
                    }
                }
                NormalizedTable::Int(out)
            }
            _ => {
                let mut out = PivotCrosstab::new(self.row_ids.clone(), self.col_ids.clone(), self.header.clone());
                for i in 0..num_rows {
                    for j in 0..num_cols {
                        let v = dense[i][j];
                        let normalized = match (mode, norm_type) {
                            (NormalizationMode::Rows, NormalizationType::L1) => safe_div(v, sum_row[i]),
                            (NormalizationMode::Rows, NormalizationType::L2) => safe_div(v, sum_sq_row[i].sqrt()),
                            (NormalizationMode::Columns, NormalizationType::L1) => safe_div(v, sum_col[j]),
                            (NormalizationMode::Columns, NormalizationType::L2) => safe_div(v, sum_sq_col[j].sqrt()),
                            (NormalizationMode::Table, NormalizationType::L1) => safe_div(v, total),
                            (NormalizationMode::Table, NormalizationType::L2) => {
                                let norm: f64 = dense.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
                                safe_div(v, norm)
                            }
                            (NormalizationMode::Quotients, _) => safe_div(v * total, sum_row[i] * sum_col[j]),
                            (NormalizationMode::TfIdf, _) => {
                                let doc_freq: f64 = (0..num_rows).filter(|&k| dense[k][j] != 0.0).count() as f64;
                                let idf = if doc_freq == 0.0 { 0.0 } else { (num_rows as f64 / doc_freq).ln() };
                                v * idf
                            }
                            (NormalizationMode::PresenceAbsence, _) => unreachable!(),
                        };
                        out.set(self.row_ids[i].clone(), self.col_ids[j].clone(), normalized);
                    }
                }
                NormalizedTable::Float(out)
            }
        }
    }

    /// Document frequency per column: the number of rows in which the
    /// column has a non-zero count, as a single-row table.
    pub fn to_document_frequency(&self) -> IntPivotCrosstab {
        let dense = self.dense();
        let mut header = self.header.clone();
        header.header_row_id = "__unit__".to_string();
        header.header_col_id = "__context__".to_string();
        let context_row = Label::Str("__document_frequency__".to_string());
        let mut out = IntPivotCrosstab::new(vec![context_row.clone()], self.col_ids.clone(), header);
        for (j, col) in self.col_ids.iter().enumerate() {
            let freq = (0..self.row_ids.len()).filter(|&i| dense[i][j] != 0.0).count() as i64;
            out.set(context_row.clone(), col.clone(), freq);
        }
        out
    }

    /// Markov association matrix between columns (Bavaud & Xanthos
    /// 2005): `exchange = Fᵀ D_r⁻¹ F / total`, rescaled by `bias`.
    pub fn to_association_matrix(&self, bias: AssociationBias) -> PivotCrosstab {
        let skip_first_col = self.header.header_col_type == ColumnType::Continuous;
        let col_ids: Vec<Label> = if skip_first_col {
            self.col_ids.iter().skip(1).cloned().collect()
        } else {
            self.col_ids.clone()
        };
        let col_offset = if skip_first_col { 1 } else { 0 };

        let dense = self.dense();
        let num_rows = self.row_ids.len();
        let num_cols = col_ids.len();
        let sub = |i: usize, j: usize| dense[i][j + col_offset];

        let sum_row: Vec<f64> = (0..num_rows).map(|i| (0..num_cols).map(|j| sub(i, j)).sum()).collect();
        let sum_col: Vec<f64> = (0..num_cols).map(|j| (0..num_rows).map(|i| sub(i, j)).sum()).collect();
        let total: f64 = sum_row.iter().sum();

        let mut exchange = vec![vec![0.0; num_cols]; num_cols];
        for j in 0..num_cols {
            for k in 0..num_cols {
                let mut acc = 0.0;
                for i in 0..num_rows {
                    if sum_row[i] != 0.0 {
                        acc += sub(i, j) * sub(i, k) / sum_row[i];
                    }
                }
                exchange[j][k] = if total != 0.0 { acc / total } else { 0.0 };
            }
        }

        let output = match bias {
            AssociationBias::Frequent => exchange,
            AssociationBias::None => {
                let pi: Vec<f64> = sum_col.iter().map(|&s| if total != 0.0 { s / total } else { 0.0 }).collect();
                let inv_sqrt_pi: Vec<f64> = pi.iter().map(|&p| if p > 0.0 { 1.0 / p.sqrt() } else { 0.0 }).collect();
                (0..num_cols)
                    .map(|j| (0..num_cols).map(|k| exchange[j][k] * inv_sqrt_pi[j] * inv_sqrt_pi[k]).collect())
                    .collect()
            }
            AssociationBias::Rare => {
                let pi: Vec<f64> = sum_col.iter().map(|&s| if total != 0.0 { s / total } else { 0.0 }).collect();
                let inv_pi: Vec<f64> = pi.iter().map(|&p| if p > 0.0 { 1.0 / p } else { 0.0 }).collect();
                (0..num_cols)
                    .map(|j| (0..num_cols).map(|k| exchange[j][k] * inv_pi[j] * inv_pi[k]).collect())
                    .collect()
            }
        };

        let mut out = PivotCrosstab::new(
            col_ids.clone(),
            col_ids.clone(),
            TableHeader {
                header_col_id: "__unit__".to_string(),
                header_col_type: ColumnType::String,
                col_type: self.header.col_type.clone(),
                ..TableHeader::default()
            },
        );
        for (j, row_label) in col_ids.iter().enumerate() {
            for (k, col_label) in col_ids.iter().enumerate() {
                out.set(row_label.clone(), col_label.clone(), output[j][k]);
            }
        }
        out
    }

    /// One row per non-zero cell: `[unit, context]` (matching Python's
    /// `[col_id, row_id]` column order).
    pub fn to_flat(&self, progress_callback: Option<&dyn Fn()>) -> FlatCrosstab {
        let unit_col = self.header.header_row_id.clone();
        let context_col = self.header.header_col_id.clone();
        let mut rows = Vec::new();
        for row in &self.row_ids {
            for col in &self.col_ids {
                let count = self.get(row, col).unwrap_or(0);
                for _ in 0..count.max(0) {
                    rows.push((col.clone(), row.clone()));
                }
            }
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        FlatCrosstab::new(unit_col, context_col, rows)
    }

    pub fn to_weighted_flat(&self, progress_callback: Option<&dyn Fn()>) -> IntWeightedFlatCrosstab {
        let column_col = self.header.header_row_id.clone();
        let row_col = if self.row_ids.len() > 1 { Some(self.header.header_col_id.clone()) } else { None };
        let mut rows = Vec::new();
        for row in &self.row_ids {
            for col in &self.col_ids {
                let count = self.get(row, col).unwrap_or(0);
                if count == 0 {
                    continue;
                }
                rows.push((col.clone(), row.clone(), count));
            }
            if let Some(cb) = progress_callback {
                cb();
            }
        }
        IntWeightedFlatCrosstab::new(column_col, row_col, rows)
    }

    pub fn to_string_tsv(&self) -> String {
        super::Table::IntPivot(self.clone()).to_string_tsv()
    }
}

pub enum NormalizedTable {
    Float(PivotCrosstab),
    Int(IntPivotCrosstab),
}

impl NormalizedTable {
    pub fn cell(&self, row: &Label, col: &Label) -> CellValue {
        match self {
            NormalizedTable::Float(t) => t.get(row, col).map(CellValue::Float).unwrap_or(CellValue::Missing),
            NormalizedTable::Int(t) => t.get(row, col).map(CellValue::Int).unwrap_or(CellValue::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntPivotCrosstab {
        let mut t = IntPivotCrosstab::new(
            vec![Label::from("ctx1"), Label::from("ctx2")],
            vec![Label::from("unit1"), Label::from("unit2")],
            TableHeader::default(),
        );
        t.set(Label::from("ctx1"), Label::from("unit1"), 1);
        t.set(Label::from("ctx1"), Label::from("unit2"), 3);
        t.set(Label::from("ctx2"), Label::from("unit1"), 4);
        t.set(Label::from("ctx2"), Label::from("unit2"), 2);
        t
    }

    #[test]
    fn row_normalization_sums_to_one() {
        let t = sample();
        let normalized = t.to_normalized(NormalizationMode::Rows, NormalizationType::L1);
        let NormalizedTable::Float(f) = normalized else { panic!("expected float table") };
        let row1_sum = f.get(&Label::from("ctx1"), &Label::from("unit1")).unwrap()
            + f.get(&Label::from("ctx1"), &Label::from("unit2")).unwrap();
        assert!((row1_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn presence_absence_stays_integer_and_binary() {
        let t = sample();
        let normalized = t.to_normalized(NormalizationMode::PresenceAbsence, NormalizationType::L1);
        let NormalizedTable::Int(i) = normalized else { panic!("expected int table") };
        assert_eq!(i.get(&Label::from("ctx1"), &Label::from("unit1")), Some(1));
    }

    #[test]
    fn transposed_swaps_axes() {
        let t = sample();
        let transposed = t.to_transposed();
        assert_eq!(transposed.get(&Label::from("unit1"), &Label::from("ctx1")), Some(1));
        assert_eq!(transposed.get(&Label::from("unit2"), &Label::from("ctx2")), Some(2));
    }

    #[test]
    fn to_flat_preserves_total_count() {
        let t = sample();
        let flat = t.to_flat(None);
        assert_eq!(flat.row_ids.len(), 1 + 3 + 4 + 2);
    }

    #[test]
    fn to_flat_to_pivot_round_trips_cell_wise() {
        let t = sample();
        let round_tripped = t.to_flat(None).to_pivot(None);
        assert_eq!(round_tripped.row_ids, t.row_ids);
        assert_eq!(round_tripped.col_ids, t.col_ids);
        for row in &t.row_ids {
            for col in &t.col_ids {
                assert_eq!(round_tripped.get(row, col), t.get(row, col));
            }
        }
    }

    #[test]
    fn to_weighted_flat_to_pivot_round_trips_cell_wise() {
        let t = sample();
        let round_tripped = t.to_weighted_flat(None).to_pivot(None);
        assert_eq!(round_tripped.row_ids, t.row_ids);
        assert_eq!(round_tripped.col_ids, t.col_ids);
        for row in &t.row_ids {
            for col in &t.col_ids {
                assert_eq!(round_tripped.get(row, col), t.get(row, col));
            }
        }
    }
}
