use crate::collections::{HashMap, HashSet};
use crate::table::{IntPivotCrosstab, Label, Table};

use super::{count_in_context, count_in_window, ContextGroupSpec, UnitSpec};

fn suffixed_row_id(header_row_id: &str) -> String {
    match header_row_id.strip_suffix("__") {
        Some(stripped) => format!("{stripped}2__"),
        None => format!("{header_row_id}2"),
    }
}

/// Presence set per row: the columns with a non-zero count, i.e. the
/// row's presence/absence vector without materializing it densely.
fn presence_sets(table: &IntPivotCrosstab) -> HashMap<Label, Vec<Label>> {
    table
        .row_ids
        .iter()
        .map(|row| {
            let present: Vec<Label> = table
                .col_ids
                .iter()
                .filter(|col| table.get(row, col).is_some_and(|v| v != 0))
                .cloned()
                .collect();
            (row.clone(), present)
        })
        .collect()
}

/// Gram matrix of a contingency table's columns: `cooc[j][k]` is the
/// number of rows in which both column `j` and column `k` are present.
/// Equivalent to `transpose(P) . P` where `P` is the presence/absence
/// matrix, but computed directly from the sparse presence sets.
fn gram(table: &IntPivotCrosstab) -> IntPivotCrosstab {
    let presence = presence_sets(table);
    let mut out = IntPivotCrosstab::new(
        table.col_ids.clone(),
        table.col_ids.clone(),
        crate::table::TableHeader {
            header_row_id: suffixed_row_id(&table.header.header_row_id),
            header_row_type: table.header.header_row_type,
            header_col_id: table.header.header_col_id.clone(),
            header_col_type: table.header.header_col_type,
            col_type: table.header.col_type.clone(),
            class_col_id: None,
        },
    );
    for present in presence.values() {
        for j in present {
            for k in present {
                let existing = out.get(j, k).unwrap_or(0);
                out.set(j.clone(), k.clone(), existing + 1);
            }
        }
    }
    out
}

/// Gram matrix between two contingency tables' columns, restricted to
/// the rows they have in common: `cooc[j2][k1]` is the number of shared
/// rows in which column `j2` of `table2` and column `k1` of `table1` are
/// both present.
fn gram_between(table1: &IntPivotCrosstab, table2: &IntPivotCrosstab) -> IntPivotCrosstab {
    let rows1: HashSet<Label> = table1.row_ids.iter().cloned().collect();
    let common_rows: Vec<Label> = table2.row_ids.iter().filter(|r| rows1.contains(r)).cloned().collect();

    let presence1 = presence_sets(table1);
    let presence2 = presence_sets(table2);

    let header_row_id = if table1.header.header_row_id == table2.header.header_row_id {
        suffixed_row_id(&table1.header.header_row_id)
    } else {
        table1.header.header_row_id.clone()
    };

    let mut out = IntPivotCrosstab::new(
        table2.col_ids.clone(),
        table1.col_ids.clone(),
        crate::table::TableHeader {
            header_row_id,
            header_row_type: table1.header.header_row_type,
            header_col_id: table1.header.header_col_id.clone(),
            header_col_type: table2.header.header_col_type,
            col_type: table1.header.col_type.clone(),
            class_col_id: None,
        },
    );
    for row in &common_rows {
        let Some(p1) = presence1.get(row) else { continue };
        let Some(p2) = presence2.get(row) else { continue };
        for j2 in p2 {
            for k1 in p1 {
                let existing = out.get(j2, k1).unwrap_or(0);
                out.set(j2.clone(), k1.clone(), existing + 1);
            }
        }
    }
    out
}

/// Co-occurrence of unit types within a sliding window: the number of
/// windows in which both types appear, for every pair of types.
///
/// Grounded on `Processor.py::cooc_in_window`.
pub fn cooc_in_window(units: UnitSpec, window_size: usize) -> Table {
    let Table::IntPivot(contingency) = count_in_window(units, window_size) else {
        unreachable!("count_in_window always returns IntPivot")
    };
    Table::IntPivot(gram(&contingency))
}

/// Co-occurrence of unit types within contexts: the number of contexts
/// in which both types appear. When `units2` is given, cross-tabulates
/// `units2`'s types against `units`'s types instead of a type against
/// itself, restricted to contexts the two counts have in common.
///
/// Grounded on `Processor.py::cooc_in_context`.
pub fn cooc_in_context(units: UnitSpec, contexts: ContextGroupSpec, units2: Option<UnitSpec>) -> Table {
    let Table::IntPivot(contingency) = count_in_context(units, contexts) else {
        unreachable!("count_in_context always returns IntPivot")
    };
    match units2 {
        Some(units2) => {
            let Table::IntPivot(contingency2) = count_in_context(units2, contexts) else {
                unreachable!("count_in_context always returns IntPivot")
            };
            Table::IntPivot(gram_between(&contingency, &contingency2))
        }
        None => Table::IntPivot(gram(&contingency)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::segmentation::Segmentation;
    use crate::store;
    use crate::table::Label as L;

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
    fn cooc_in_window_counts_shared_window_membership() {
        let units = words("a b c d");
        let table = cooc_in_window(UnitSpec::new(&units), 2);
        let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
        assert_eq!(t.get(&L::from("a"), &L::from("b")), Some(1));
        assert_eq!(t.get(&L::from("a"), &L::from("a")), Some(1));
        assert_eq!(t.get(&L::from("a"), &L::from("c")), None);
    }
}
