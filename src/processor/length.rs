use crate::collections::HashMap;
use crate::segmentation::Segmentation;
use crate::table::{Label, PivotCrosstab, Table, TableHeader};

use super::{label_of, unit_type_of, GLOBAL_CONTEXT};

const LENGTH: &str = "__length__";
const LENGTH_AVERAGE: &str = "__length_average__";
const LENGTH_COUNT: &str = "__length_count__";
const LENGTH_STD_DEVIATION: &str = "__length_std_deviation__";

fn numeric_header(col_ids: &[String]) -> TableHeader {
    let mut col_type = crate::collections::HashMap::default();
    for c in col_ids {
        col_type.insert(c.clone(), crate::table::ColumnType::Continuous);
    }
    TableHeader {
        header_row_id: "__context__".to_string(),
        header_row_type: crate::table::ColumnType::String,
        header_col_id: "__col__".to_string(),
        header_col_type: crate::table::ColumnType::String,
        col_type,
        class_col_id: None,
    }
}

fn population_stdev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Counts (per context, or per averaging unit within a context) how
/// many unit segments a context/averaging-unit contains. Without
/// `averaging`, each context's `__length__` is its contained-unit count.
/// With `averaging`, each context reports the mean, count, and
/// (optionally) population standard deviation of its averaging units'
/// contained-unit counts. Contexts whose length/average is zero are
/// dropped from the result.
///
/// Grounded on `Processor.py::length_in_context`.
pub fn length_in_context(
    units: &Segmentation,
    averaging: Option<(&Segmentation, bool)>,
    contexts: Option<(&Segmentation, Option<&str>, bool)>,
) -> Table {
    let mut values: HashMap<(String, String), f64> = HashMap::default();
    let mut context_types: Vec<String> = Vec::new();
    let mut col_ids: Vec<String> = Vec::new();

    match contexts {
        Some((context_segmentation, context_annotation_key, merge)) => {
            let context_list: Vec<String> = if merge {
                Vec::new()
            } else {
                context_segmentation
                    .iter()
                    .map(|c| unit_type_of(&c, context_annotation_key))
                    .collect()
            };

            if let Some((averaging_segmentation, std_deviation)) = averaging {
                let mut lengths: HashMap<String, Vec<usize>> = HashMap::default();
                for (context_index, context_segment) in context_segmentation.iter().enumerate() {
                    let context_type = if merge {
                        GLOBAL_CONTEXT.to_string()
                    } else {
                        let t = context_list[context_index].clone();
                        if !context_types.contains(&t) {
                            context_types.push(t.clone());
                        }
                        t
                    };

                    let my_lengths: Vec<usize> = context_segment
                        .get_contained_segments(averaging_segmentation)
                        .iter()
                        .map(|a| a.get_contained_segment_indices(units).len())
                        .collect();
                    lengths.entry(context_type).or_default().extend(my_lengths);
                }
                if merge {
                    context_types.push(GLOBAL_CONTEXT.to_string());
                }

                for context_type in &context_types {
                    let Some(my_lengths) = lengths.get(context_type) else { continue };
                    let floats: Vec<f64> = my_lengths.iter().map(|&l| l as f64).collect();
                    let average = floats.iter().sum::<f64>() / floats.len().max(1) as f64;
                    values.insert((context_type.clone(), LENGTH_AVERAGE.to_string()), average);
                    values.insert((context_type.clone(), LENGTH_COUNT.to_string()), floats.len() as f64);
                    if std_deviation {
                        values.insert(
                            (context_type.clone(), LENGTH_STD_DEVIATION.to_string()),
                            population_stdev(&floats),
                        );
                    }
                }
                if !values.is_empty() {
                    col_ids.push(LENGTH_AVERAGE.to_string());
                    col_ids.push(LENGTH_COUNT.to_string());
                    if std_deviation {
                        col_ids.push(LENGTH_STD_DEVIATION.to_string());
                    }
                }
            } else {
                for (context_index, context_segment) in context_segmentation.iter().enumerate() {
                    let context_type = if merge {
                        GLOBAL_CONTEXT.to_string()
                    } else {
                        let t = context_list[context_index].clone();
                        if !context_types.contains(&t) {
                            context_types.push(t.clone());
                        }
                        t
                    };
                    let count = context_segment.get_contained_segment_indices(units).len() as f64;
                    *values.entry((context_type, LENGTH.to_string())).or_insert(0.0) += count;
                }
                if merge && !context_types.contains(&GLOBAL_CONTEXT.to_string()) {
                    context_types.push(GLOBAL_CONTEXT.to_string());
                }
                if !values.is_empty() {
                    col_ids.push(LENGTH.to_string());
                }
            }
        }
        None => {
            if let Some((averaging_segmentation, std_deviation)) = averaging {
                context_types.push(GLOBAL_CONTEXT.to_string());
                let floats: Vec<f64> = averaging_segmentation
                    .iter()
                    .map(|a| a.get_contained_segment_indices(units).len() as f64)
                    .collect();
                let average = floats.iter().sum::<f64>() / floats.len().max(1) as f64;
                values.insert((GLOBAL_CONTEXT.to_string(), LENGTH_AVERAGE.to_string()), average);
                values.insert((GLOBAL_CONTEXT.to_string(), LENGTH_COUNT.to_string()), floats.len() as f64);
                if std_deviation {
                    values.insert(
                        (GLOBAL_CONTEXT.to_string(), LENGTH_STD_DEVIATION.to_string()),
                        population_stdev(&floats),
                    );
                }
                col_ids.push(LENGTH_AVERAGE.to_string());
                col_ids.push(LENGTH_COUNT.to_string());
                if std_deviation {
                    col_ids.push(LENGTH_STD_DEVIATION.to_string());
                }
            } else {
                context_types.push(GLOBAL_CONTEXT.to_string());
                values.insert((GLOBAL_CONTEXT.to_string(), LENGTH.to_string()), units.len() as f64);
                col_ids.push(LENGTH.to_string());
            }
        }
    }

    let length_col = if averaging.is_some() { LENGTH_AVERAGE } else { LENGTH };
    context_types.retain(|c| values.get(&(c.clone(), length_col.to_string())).is_some_and(|v| *v != 0.0));
    values.retain(|(c, _), _| context_types.contains(c));

    build_table(context_types, col_ids, values)
}

/// Slides a window of `window_size` averaging units across
/// `averaging.segmentation`, reporting for each window the mean (and
/// optionally population standard deviation) of contained-unit counts,
/// maintained incrementally via running sums of values and squares.
///
/// Grounded on `Processor.py::length_in_window`.
pub fn length_in_window(units: &Segmentation, averaging_segmentation: &Segmentation, std_deviation: bool, window_size: usize) -> Table {
    let mut values: HashMap<(String, String), f64> = HashMap::default();
    let mut window_type = 0usize;
    let mut col_ids: Vec<String> = Vec::new();

    let len = averaging_segmentation.len();
    if window_size > 0 && window_size <= len {
        let mut lengths: std::collections::VecDeque<f64> = averaging_segmentation
            .iter()
            .take(window_size)
            .map(|a| a.get_contained_segment_indices(units).len() as f64)
            .collect();

        let mut sum_values: f64 = lengths.iter().sum();
        let mut sum_squares: f64 = lengths.iter().map(|v| v * v).sum();
        window_type = 1;
        let average = sum_values / window_size as f64;
        values.insert(("1".to_string(), LENGTH_AVERAGE.to_string()), average);
        values.insert(("1".to_string(), LENGTH_COUNT.to_string()), window_size as f64);
        if std_deviation {
            let stdev = (sum_squares / window_size as f64 - average * average).max(0.0).sqrt();
            values.insert(("1".to_string(), LENGTH_STD_DEVIATION.to_string()), stdev);
        }

        for window_index in 1..=(len - window_size) {
            window_type = window_index + 1;
            let removed = lengths.pop_front().expect("window is non-empty");
            sum_values -= removed;
            sum_squares -= removed * removed;

            let added = averaging_segmentation.get(window_index + window_size - 1).get_contained_segment_indices(units).len() as f64;
            lengths.push_back(added);
            sum_values += added;
            sum_squares += added * added;

            let average = sum_values / window_size as f64;
            let window_str = window_type.to_string();
            values.insert((window_str.clone(), LENGTH_AVERAGE.to_string()), average);
            values.insert((window_str.clone(), LENGTH_COUNT.to_string()), window_size as f64);
            if std_deviation {
                let stdev = (sum_squares / window_size as f64 - average * average).max(0.0).sqrt();
                values.insert((window_str, LENGTH_STD_DEVIATION.to_string()), stdev);
            }
        }

        col_ids.push(LENGTH_AVERAGE.to_string());
        if std_deviation {
            col_ids.push(LENGTH_STD_DEVIATION.to_string());
        }
        col_ids.push(LENGTH_COUNT.to_string());
    }

    let context_types: Vec<String> = (1..=window_type).map(|i| i.to_string()).collect();
    build_table(context_types, col_ids, values)
}

fn build_table(context_types: Vec<String>, col_ids: Vec<String>, values: HashMap<(String, String), f64>) -> Table {
    let header = numeric_header(&col_ids);
    let row_ids: Vec<Label> = context_types.into_iter().map(label_of).collect();
    let col_label_ids: Vec<Label> = col_ids.into_iter().map(label_of).collect();
    let mut table = PivotCrosstab::new(row_ids, col_label_ids, header);
    for ((context_type, col), value) in values {
        table.set(label_of(context_type), label_of(col), value);
    }
    Table::Pivot(table)
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

    fn sentences(text: &str, splits: &[(usize, usize)]) -> Segmentation {
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("sentences");
        for &(start, end) in splits {
            seg.append(Segment::new(str_index, Some(start), Some(end)));
        }
        seg
    }

    #[test]
    fn length_in_context_without_averaging_counts_units() {
        let units = words("a b c d e");
        let contexts = sentences("a b c d e", &[(0, 3), (4, 9)]);
        let Table::Pivot(t) = length_in_context(&units, None, Some((&contexts, None, false))) else {
            panic!("expected Pivot")
        };
        assert_eq!(t.get(&label_of("a b"), &label_of(LENGTH)), Some(2.0));
        assert_eq!(t.get(&label_of("c d e"), &label_of(LENGTH)), Some(3.0));
    }

    #[test]
    fn length_in_window_computes_running_mean_and_stdev() {
        let units = words("a b c d e f");
        let averaging = sentences("a b c d e f", &[(0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11)]);
        let table = length_in_window(&units, &averaging, true, 3);
        let Table::Pivot(t) = table else { panic!("expected Pivot") };
        assert_eq!(t.row_ids.len(), 4);
        assert!(t.get(&label_of("1"), &label_of(LENGTH_AVERAGE)).is_some());
        assert!(t.get(&label_of("4"), &label_of(LENGTH_STD_DEVIATION)).is_some());
    }
}
