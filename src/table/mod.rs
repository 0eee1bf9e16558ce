//! Table family (C5): pivot and flat contingency tables, with
//! normalization, transposition, association-matrix derivation, and
//! inter-format conversion.
//!
//! Grounded on `LTTL/Table.py`. The Python source models five classes
//! (`PivotCrosstab`, `IntPivotCrosstab`, `FlatCrosstab`,
//! `WeightedFlatCrosstab`, `IntWeightedFlatCrosstab`) under one `Table`
//! base, switching behavior with `isinstance` checks scattered through
//! `to_sorted`/`deepcopy`. Rust has no open class hierarchy to dispatch
//! on, so the five shapes become variants of one `Table` enum instead,
//! sharing a `TableHeader` and dispatching per-variant methods via a
//! match rather than virtual calls.

mod flat;
mod pivot;
mod record;
mod weighted_flat;

pub use flat::FlatCrosstab;
pub use pivot::{AssociationBias, IntPivotCrosstab, NormalizationMode, NormalizationType, NormalizedTable, PivotCrosstab};
pub use record::RecordTable;
pub use weighted_flat::{IntWeightedFlatCrosstab, WeightedFlatCrosstab};

use std::fmt;

/// A row or column identifier: most tables key by string (unit/context
/// content or annotation value), but flat tables number their rows
/// `1..N` and some header types are declared `continuous`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Str(String),
    Int(i64),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Str(s) => write!(f, "{s}"),
            Label::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Str(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Str(s)
    }
}

impl From<i64> for Label {
    fn from(i: i64) -> Self {
        Label::Int(i)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Continuous,
    Discrete,
}

impl ColumnType {
    fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Continuous => "continuous",
            ColumnType::Discrete => "discrete",
        }
    }
}

/// Shared metadata carried by every table shape: axis ids/types and the
/// optional class column used by downstream classifiers.
#[derive(Debug, Clone)]
pub struct TableHeader {
    pub header_row_id: String,
    pub header_row_type: ColumnType,
    pub header_col_id: String,
    pub header_col_type: ColumnType,
    pub col_type: crate::collections::HashMap<String, ColumnType>,
    pub class_col_id: Option<String>,
}

impl Default for TableHeader {
    fn default() -> Self {
        Self {
            header_row_id: "__row__".to_string(),
            header_row_type: ColumnType::String,
            header_col_id: "__col__".to_string(),
            header_col_type: ColumnType::String,
            col_type: crate::collections::HashMap::default(),
            class_col_id: None,
        }
    }
}

impl TableHeader {
    pub fn col_type_of(&self, col_id: &str) -> ColumnType {
        self.col_type.get(col_id).copied().unwrap_or(ColumnType::String)
    }
}

/// A cell value rendered generically across table shapes for `to_string`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Str(String),
    Missing,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Str(s) => write!(f, "{s}"),
            CellValue::Missing => write!(f, ""),
        }
    }
}

/// The table family, unified for storage and generic rendering; each
/// variant still exposes its own richer, shape-specific methods.
pub enum Table {
    Pivot(PivotCrosstab),
    IntPivot(IntPivotCrosstab),
    Flat(FlatCrosstab),
    WeightedFlat(WeightedFlatCrosstab),
    IntWeightedFlat(IntWeightedFlatCrosstab),
    Record(RecordTable),
}

impl Table {
    pub fn header(&self) -> &TableHeader {
        match self {
            Table::Pivot(t) => &t.header,
            Table::IntPivot(t) => &t.header,
            Table::Flat(t) => &t.header,
            Table::WeightedFlat(t) => &t.header,
            Table::IntWeightedFlat(t) => &t.header,
            Table::Record(t) => &t.header,
        }
    }

    pub fn row_ids(&self) -> Vec<Label> {
        match self {
            Table::Pivot(t) => t.row_ids.clone(),
            Table::IntPivot(t) => t.row_ids.clone(),
            Table::Flat(t) => t.row_ids.iter().map(|&i| Label::Int(i as i64)).collect(),
            Table::WeightedFlat(t) => t.row_ids.iter().map(|&i| Label::Int(i as i64)).collect(),
            Table::IntWeightedFlat(t) => t.row_ids.iter().map(|&i| Label::Int(i as i64)).collect(),
            Table::Record(t) => t.row_ids.clone(),
        }
    }

    pub fn col_ids(&self) -> Vec<Label> {
        match self {
            Table::Pivot(t) => t.col_ids.clone(),
            Table::IntPivot(t) => t.col_ids.clone(),
            Table::Flat(t) => t.col_ids.to_vec(),
            Table::WeightedFlat(t) => t.col_ids.clone(),
            Table::IntWeightedFlat(t) => t.col_ids.clone(),
            Table::Record(t) => t.col_ids.iter().map(|c| Label::Str(c.clone())).collect(),
        }
    }

    pub fn get(&self, row: &Label, col: &Label) -> CellValue {
        match self {
            Table::Pivot(t) => t
                .get(row, col)
                .map(CellValue::Float)
                .unwrap_or(CellValue::Missing),
            Table::IntPivot(t) => t
                .get(row, col)
                .map(CellValue::Int)
                .unwrap_or(CellValue::Missing),
            Table::Flat(t) => {
                let Label::Int(row_id) = row else { return CellValue::Missing };
                t.get(*row_id as usize, col)
                    .map(|l| CellValue::Str(l.to_string()))
                    .unwrap_or(CellValue::Missing)
            }
            Table::WeightedFlat(t) => {
                let Label::Int(row_id) = row else { return CellValue::Missing };
                t.get(*row_id as usize, col)
            }
            Table::IntWeightedFlat(t) => {
                let Label::Int(row_id) = row else { return CellValue::Missing };
                t.get(*row_id as usize, col)
            }
            Table::Record(t) => t.get(row, &col.to_string()).cloned().unwrap_or(CellValue::Missing),
        }
    }

    /// Tab-separated rendering, matching `Table.to_string`'s default
    /// delimiters (`\t` between columns, `\n` between rows).
    pub fn to_string_tsv(&self) -> String {
        let header = self.header();
        let col_ids = self.col_ids();
        let mut out = String::new();
        out.push_str(&header.header_col_id);
        for col in &col_ids {
            out.push('\t');
            out.push_str(&col.to_string());
        }
        for row in self.row_ids() {
            out.push('\n');
            out.push_str(&row.to_string());
            for col in &col_ids {
                out.push('\t');
                out.push_str(&self.get(&row, col).to_string());
            }
        }
        out
    }
}
