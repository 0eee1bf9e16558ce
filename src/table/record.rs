use crate::collections::HashMap;

use super::{CellValue, Label, TableHeader};

/// A generic, arbitrarily-columned table: one row per record, cells
/// holding whichever scalar type the producing function wants (string,
/// integer position, or annotation value). Grounded on `LTTL/Table.py`'s
/// base `Table` class, which the concordance/collocation functions
/// (`annotate_contexts`, `context`, `neighbors`, `collocations`)
/// instantiate directly rather than going through one of its
/// specialized pivot/flat subclasses.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub row_ids: Vec<Label>,
    pub col_ids: Vec<String>,
    pub values: HashMap<(Label, String), CellValue>,
    pub header: TableHeader,
}

impl RecordTable {
    pub fn new(row_ids: Vec<Label>, col_ids: Vec<String>, header: TableHeader) -> Self {
        Self {
            row_ids,
            col_ids,
            values: HashMap::default(),
            header,
        }
    }

    pub fn set(&mut self, row: Label, col: impl Into<String>, value: CellValue) {
        self.values.insert((row, col.into()), value);
    }

    pub fn get(&self, row: &Label, col: &str) -> Option<&CellValue> {
        self.values.get(&(row.clone(), col.to_string()))
    }

    pub fn to_string_tsv(&self) -> String {
        super::Table::Record(self.clone()).to_string_tsv()
    }
}
