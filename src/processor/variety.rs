use rand::Rng;

use crate::collections::HashMap;
use crate::error::{SegError, SegResult};
use crate::segmentation::Segmentation;
use crate::table::{IntPivotCrosstab, Label, PivotCrosstab, Table, TableHeader};
use crate::util::{
    generate_random_annotation_key, get_average, get_expected_subsample_variety, get_unused_char_in_segmentation,
    get_variety, iround, prepend_unit_with_category, sample_dict,
};

use super::{count_in_context, count_in_window, label_of, ContextGroupSpec, UnitSpec};

const VARIETY: &str = "__variety__";
const VARIETY_AVERAGE: &str = "__variety_average__";
const VARIETY_STD_DEVIATION: &str = "__variety_std_deviation__";
const VARIETY_COUNT: &str = "__variety_count__";
const SUBSAMPLE_SIZE: &str = "__subsample_size__";
const EXPECTED_VARIETY: &str = "__expected_variety__";

const RANDOM_ANNOTATION_KEY_LENGTH: usize = 8;

/// Units and categories knobs shared by `variety_in_context` and
/// `variety_in_window`. `category_annotation_key`/`category_weighting`/
/// `category_adjust` only matter when `measure_per_category` is set.
#[derive(Clone, Copy)]
pub struct VarietySpec<'a> {
    pub unit_segmentation: &'a Segmentation,
    pub unit_annotation_key: Option<&'a str>,
    pub seq_length: usize,
    pub unit_weighting: bool,
    pub measure_per_category: bool,
    pub category_annotation_key: Option<&'a str>,
    pub category_weighting: bool,
    pub category_adjust: bool,
}

impl<'a> VarietySpec<'a> {
    pub fn new(unit_segmentation: &'a Segmentation) -> Self {
        Self {
            unit_segmentation,
            unit_annotation_key: None,
            seq_length: 1,
            unit_weighting: false,
            measure_per_category: false,
            category_annotation_key: None,
            category_weighting: false,
            category_adjust: true,
        }
    }

    fn unit_spec(&self) -> UnitSpec<'a> {
        UnitSpec {
            segmentation: self.unit_segmentation,
            annotation_key: self.unit_annotation_key,
            seq_length: self.seq_length,
            intra_seq_delimiter: "#",
        }
    }

    fn category_spec(&self) -> UnitSpec<'a> {
        UnitSpec {
            segmentation: self.unit_segmentation,
            annotation_key: self.category_annotation_key,
            seq_length: self.seq_length,
            intra_seq_delimiter: "#",
        }
    }
}

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

/// Pulls a row out of an int pivot crosstab as a plain frequency
/// dictionary keyed by column label text, the way `Processor.py`'s
/// `tuple_to_simple_dict` does.
fn row_dict(table: &IntPivotCrosstab, row_id: &Label) -> HashMap<String, u64> {
    table
        .col_ids
        .iter()
        .filter_map(|c| table.get(row_id, c).map(|v| (c.to_string(), v.max(0) as u64)))
        .collect()
}

fn build_table(row_ids: Vec<Label>, col_ids: Vec<String>, values: HashMap<(Label, String), f64>) -> Table {
    let header = numeric_header(&col_ids);
    let col_label_ids: Vec<Label> = col_ids.iter().map(|c| label_of(c.clone())).collect();
    let mut table = PivotCrosstab::new(row_ids, col_label_ids, header);
    for ((row, col), value) in values {
        table.set(row, label_of(col), value);
    }
    Table::Pivot(table)
}

/// Finds the subsample size in `[2, subsample_size]` whose expected
/// lexematic type-token ratio is closest to `target_nlttr`, by bisection
/// search over `get_expected_subsample_variety`. Grounded on the RMSP
/// size-search loop in `Processor.py::variety_in_window` (the same loop
/// reappears verbatim in `variety_in_context`).
fn find_rmsp_subsample_size(cat_row: &HashMap<String, u64>, subsample_size: u64, target_nlttr: f64) -> SegResult<u64> {
    let mut size_low = 2u64;
    let mut size_high = subsample_size;
    let mut size_tmp = size_high;
    let mut nlttr_tmp = get_expected_subsample_variety(cat_row, size_tmp)? / size_tmp as f64;

    loop {
        if nlttr_tmp == target_nlttr || size_low == size_high {
            break;
        }
        if size_high - size_low == 1 {
            let high = get_expected_subsample_variety(cat_row, size_high)? / size_high as f64;
            let low = get_expected_subsample_variety(cat_row, size_low)? / size_low as f64;
            size_tmp = if high - target_nlttr < target_nlttr - low { size_high } else { size_low };
            break;
        }
        size_tmp = iround((size_low + size_high) as f64 / 2.0) as u64;
        nlttr_tmp = get_expected_subsample_variety(cat_row, size_tmp)? / size_tmp as f64;
        if nlttr_tmp < target_nlttr {
            size_high = size_tmp;
        } else if nlttr_tmp > target_nlttr {
            size_low = size_tmp;
        }
    }
    Ok(size_tmp)
}

fn resampled_variety(
    row: &HashMap<String, u64>,
    size: u64,
    num_subsamples: u64,
    spec: &VarietySpec,
    category_delimiter: Option<&str>,
    rng: &mut impl Rng,
) -> Vec<f64> {
    let mut varieties = Vec::new();
    for _ in 0..num_subsamples {
        match sample_dict(row, size, rng) {
            Ok(sampled) => varieties.push(get_variety(&sampled, spec.unit_weighting, spec.category_weighting, category_delimiter)),
            Err(err) => {
                tracing::warn!(size, requested = num_subsamples, got = varieties.len(), %err, "stopping resampling early");
                break;
            }
        }
    }
    varieties
}

fn resampling_col_ids(measure_per_category: bool, unit_weighting: bool, category_adjust: bool) -> Vec<String> {
    if measure_per_category {
        if category_adjust {
            vec![VARIETY_AVERAGE, VARIETY_STD_DEVIATION, SUBSAMPLE_SIZE, VARIETY_COUNT]
        } else {
            vec![VARIETY_AVERAGE, VARIETY_STD_DEVIATION, VARIETY_COUNT]
        }
    } else if unit_weighting {
        vec![VARIETY_AVERAGE, VARIETY_STD_DEVIATION, VARIETY_COUNT]
    } else {
        vec![EXPECTED_VARIETY]
    }
    .into_iter()
    .map(String::from)
    .collect()
}

/// For each context, measures lexical variety of its contained units:
/// the raw type count (or, under resampling, the average variety across
/// Monte-Carlo subsamples, or the closed-form expected variety of a
/// subsample). With `measure_per_category`, varieties are computed
/// separately within each category value and averaged across
/// categories, optionally adjusting the subsample size per context so
/// that every context is compared at the same expected type-token ratio
/// (the "RMSP" procedure).
///
/// Grounded on `Processor.py::variety_in_context`.
#[allow(clippy::too_many_arguments)]
pub fn variety_in_context(
    spec: VarietySpec,
    contexts: ContextGroupSpec,
    apply_resampling: bool,
    subsample_size: Option<u64>,
    num_subsamples: Option<u64>,
    rng: &mut impl Rng,
) -> SegResult<Table> {
    if spec.measure_per_category && spec.seq_length > 1 {
        return Err(SegError::Configuration(
            "cannot measure diversity per category when sequence length is greater than 1".to_string(),
        ));
    }
    if apply_resampling && (subsample_size.is_none() || num_subsamples.is_none()) {
        return Err(SegError::Configuration(
            "resampling requires a subsample size and a number of subsamples".to_string(),
        ));
    }

    let mut target_nlttr = 0.0;
    let mut category_delimiter: Option<String> = None;
    let mut category_counts: Option<IntPivotCrosstab> = None;

    let counts_pivot = if spec.measure_per_category {
        let new_annotation_key = generate_random_annotation_key(spec.unit_segmentation, RANDOM_ANNOTATION_KEY_LENGTH, rng);
        let delimiter = get_unused_char_in_segmentation(spec.unit_segmentation, spec.category_annotation_key).to_string();
        let recoded_units = prepend_unit_with_category(
            spec.unit_segmentation,
            &delimiter,
            &new_annotation_key,
            spec.category_annotation_key,
            spec.unit_annotation_key,
        );
        let recoded_unit_spec = UnitSpec {
            segmentation: &recoded_units,
            annotation_key: Some(new_annotation_key.as_str()),
            seq_length: spec.seq_length,
            intra_seq_delimiter: "#",
        };
        let Table::IntPivot(counts) = count_in_context(recoded_unit_spec, contexts) else {
            unreachable!("count_in_context always returns IntPivot")
        };

        if apply_resampling && spec.category_adjust {
            let Table::IntPivot(cat_pivot) = count_in_context(spec.category_spec(), contexts) else {
                unreachable!("count_in_context always returns IntPivot")
            };
            let mut expected_varieties = Vec::new();
            for row_id in &cat_pivot.row_ids {
                let row = row_dict(&cat_pivot, row_id);
                if let Ok(v) = get_expected_subsample_variety(&row, subsample_size.expect("checked above")) {
                    expected_varieties.push(v);
                }
            }
            if let Some(max_v) = expected_varieties.iter().cloned().fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            }) {
                target_nlttr = max_v / subsample_size.expect("checked above") as f64;
            }
            category_counts = Some(cat_pivot);
        }
        category_delimiter = Some(delimiter);
        counts
    } else {
        let Table::IntPivot(counts) = count_in_context(spec.unit_spec(), contexts) else {
            unreachable!("count_in_context always returns IntPivot")
        };
        counts
    };

    let mut new_values: HashMap<(Label, String), f64> = HashMap::default();

    for row_id in &counts_pivot.row_ids {
        let row = row_dict(&counts_pivot, row_id);
        if apply_resampling {
            let subsample_size = subsample_size.expect("checked above");
            let num_subsamples = num_subsamples.expect("checked above");
            if spec.measure_per_category {
                let size_tmp = if spec.category_adjust {
                    let cat_pivot = category_counts.as_ref().expect("set when category_adjust is true");
                    let cat_row = row_dict(cat_pivot, row_id);
                    let total: u64 = cat_row.values().sum();
                    if subsample_size > total {
                        continue;
                    }
                    find_rmsp_subsample_size(&cat_row, subsample_size, target_nlttr)?
                } else {
                    subsample_size
                };

                let varieties = resampled_variety(&row, size_tmp, num_subsamples, &spec, category_delimiter.as_deref(), rng);
                if !varieties.is_empty() {
                    let (average, stdev) = get_average(&varieties, None);
                    new_values.insert((row_id.clone(), VARIETY_AVERAGE.to_string()), average);
                    new_values.insert((row_id.clone(), VARIETY_STD_DEVIATION.to_string()), stdev);
                    if spec.category_adjust {
                        new_values.insert((row_id.clone(), SUBSAMPLE_SIZE.to_string()), size_tmp as f64);
                    }
                    new_values.insert((row_id.clone(), VARIETY_COUNT.to_string()), num_subsamples as f64);
                }
            } else if spec.unit_weighting {
                let varieties = resampled_variety(&row, subsample_size, num_subsamples, &spec, None, rng);
                if !varieties.is_empty() {
                    let (average, stdev) = get_average(&varieties, None);
                    new_values.insert((row_id.clone(), VARIETY_AVERAGE.to_string()), average);
                    new_values.insert((row_id.clone(), VARIETY_STD_DEVIATION.to_string()), stdev);
                    new_values.insert((row_id.clone(), VARIETY_COUNT.to_string()), num_subsamples as f64);
                }
            } else if let Ok(v) = get_expected_subsample_variety(&row, subsample_size) {
                new_values.insert((row_id.clone(), EXPECTED_VARIETY.to_string()), v);
            }
        } else {
            new_values.insert(
                (row_id.clone(), VARIETY.to_string()),
                get_variety(&row, spec.unit_weighting, spec.category_weighting, category_delimiter.as_deref()),
            );
        }
    }

    let col_ids = if apply_resampling {
        resampling_col_ids(spec.measure_per_category, spec.unit_weighting, spec.category_adjust)
    } else {
        vec![VARIETY.to_string()]
    };

    Ok(build_table(counts_pivot.row_ids.clone(), col_ids, new_values))
}

/// Slides a window of `window_size` units across the segmentation,
/// measuring lexical variety within each window the same way
/// `variety_in_context` measures it per context.
///
/// Grounded on `Processor.py::variety_in_window`.
#[allow(clippy::too_many_arguments)]
pub fn variety_in_window(
    spec: VarietySpec,
    window_size: usize,
    apply_resampling: bool,
    subsample_size: Option<u64>,
    num_subsamples: Option<u64>,
    rng: &mut impl Rng,
) -> SegResult<Table> {
    if spec.measure_per_category && spec.seq_length > 1 {
        return Err(SegError::Configuration(
            "cannot measure diversity per category when sequence length is greater than 1".to_string(),
        ));
    }
    if apply_resampling && (subsample_size.is_none() || num_subsamples.is_none()) {
        return Err(SegError::Configuration(
            "resampling requires a subsample size and a number of subsamples".to_string(),
        ));
    }

    let mut target_nlttr = 0.0;
    let mut category_delimiter: Option<String> = None;
    let mut category_counts: Option<IntPivotCrosstab> = None;

    let counts_pivot = if spec.measure_per_category {
        let new_annotation_key = generate_random_annotation_key(spec.unit_segmentation, RANDOM_ANNOTATION_KEY_LENGTH, rng);
        let delimiter = get_unused_char_in_segmentation(spec.unit_segmentation, spec.category_annotation_key).to_string();
        let recoded_units = prepend_unit_with_category(
            spec.unit_segmentation,
            &delimiter,
            &new_annotation_key,
            spec.category_annotation_key,
            spec.unit_annotation_key,
        );
        let recoded_unit_spec = UnitSpec {
            segmentation: &recoded_units,
            annotation_key: Some(new_annotation_key.as_str()),
            seq_length: spec.seq_length,
            intra_seq_delimiter: "#",
        };
        let Table::IntPivot(counts) = count_in_window(recoded_unit_spec, window_size) else {
            unreachable!("count_in_window always returns IntPivot")
        };

        if apply_resampling && spec.category_adjust {
            let Table::IntPivot(cat_pivot) = count_in_window(spec.category_spec(), window_size) else {
                unreachable!("count_in_window always returns IntPivot")
            };
            let mut expected_varieties = Vec::new();
            for row_id in &cat_pivot.row_ids {
                let row = row_dict(&cat_pivot, row_id);
                if let Ok(v) = get_expected_subsample_variety(&row, subsample_size.expect("checked above")) {
                    expected_varieties.push(v);
                }
            }
            if let Some(max_v) = expected_varieties.iter().cloned().fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            }) {
                target_nlttr = max_v / subsample_size.expect("checked above") as f64;
            }
            category_counts = Some(cat_pivot);
        }
        category_delimiter = Some(delimiter);
        counts
    } else {
        let Table::IntPivot(counts) = count_in_window(spec.unit_spec(), window_size) else {
            unreachable!("count_in_window always returns IntPivot")
        };
        counts
    };

    let mut new_values: HashMap<(Label, String), f64> = HashMap::default();

    for row_id in &counts_pivot.row_ids {
        let row = row_dict(&counts_pivot, row_id);
        if apply_resampling {
            let subsample_size = subsample_size.expect("checked above");
            let num_subsamples = num_subsamples.expect("checked above");
            if spec.measure_per_category {
                let size_tmp = if spec.category_adjust {
                    let cat_pivot = category_counts.as_ref().expect("set when category_adjust is true");
                    let cat_row = row_dict(cat_pivot, row_id);
                    let total: u64 = cat_row.values().sum();
                    if subsample_size > total {
                        continue;
                    }
                    find_rmsp_subsample_size(&cat_row, subsample_size, target_nlttr)?
                } else {
                    subsample_size
                };

                let varieties = resampled_variety(&row, size_tmp, num_subsamples, &spec, category_delimiter.as_deref(), rng);
                if !varieties.is_empty() {
                    let (average, stdev) = get_average(&varieties, None);
                    new_values.insert((row_id.clone(), VARIETY_AVERAGE.to_string()), average);
                    new_values.insert((row_id.clone(), VARIETY_STD_DEVIATION.to_string()), stdev);
                    if spec.category_adjust {
                        new_values.insert((row_id.clone(), SUBSAMPLE_SIZE.to_string()), size_tmp as f64);
                    }
                    new_values.insert((row_id.clone(), VARIETY_COUNT.to_string()), num_subsamples as f64);
                }
            } else if spec.unit_weighting {
                let varieties = resampled_variety(&row, subsample_size, num_subsamples, &spec, None, rng);
                if !varieties.is_empty() {
                    let (average, stdev) = get_average(&varieties, None);
                    new_values.insert((row_id.clone(), VARIETY_AVERAGE.to_string()), average);
                    new_values.insert((row_id.clone(), VARIETY_STD_DEVIATION.to_string()), stdev);
                    new_values.insert((row_id.clone(), VARIETY_COUNT.to_string()), num_subsamples as f64);
                }
            } else if let Ok(v) = get_expected_subsample_variety(&row, subsample_size) {
                new_values.insert((row_id.clone(), EXPECTED_VARIETY.to_string()), v);
            }
        } else {
            new_values.insert(
                (row_id.clone(), VARIETY.to_string()),
                get_variety(&row, spec.unit_weighting, spec.category_weighting, category_delimiter.as_deref()),
            );
        }
    }

    let col_ids = if apply_resampling {
        resampling_col_ids(spec.measure_per_category, spec.unit_weighting, spec.category_adjust)
    } else {
        vec![VARIETY.to_string()]
    };

    Ok(build_table(counts_pivot.row_ids.clone(), col_ids, new_values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::store;
    use rand::SeedableRng;

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
    fn variety_in_context_without_resampling_counts_types() {
        let units = words("a b a c b a");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let table = variety_in_context(VarietySpec::new(&units), ContextGroupSpec::default(), false, None, None, &mut rng).unwrap();
        let Table::Pivot(t) = table else { panic!("expected Pivot") };
        assert_eq!(t.get(&label_of(super::super::GLOBAL_CONTEXT), &label_of(VARIETY)), Some(3.0));
    }

    #[test]
    fn variety_in_context_with_resampling_reports_expected_variety() {
        let units = words("a b a c b a d e f g");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(2);
        let table = variety_in_context(VarietySpec::new(&units), ContextGroupSpec::default(), true, Some(5), Some(3), &mut rng).unwrap();
        let Table::Pivot(t) = table else { panic!("expected Pivot") };
        let value = t.get(&label_of(super::super::GLOBAL_CONTEXT), &label_of(EXPECTED_VARIETY));
        assert!(value.is_some());
        assert!(value.unwrap() > 0.0);
    }

    #[test]
    fn variety_in_context_rejects_per_category_with_sequences() {
        let units = words("a b c d");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut spec = VarietySpec::new(&units);
        spec.measure_per_category = true;
        spec.seq_length = 2;
        let result = variety_in_context(spec, ContextGroupSpec::default(), false, None, None, &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn variety_in_window_slides_across_the_segmentation() {
        let units = words("a b a c b a");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(4);
        let table = variety_in_window(VarietySpec::new(&units), 3, false, None, None, &mut rng).unwrap();
        let Table::Pivot(t) = table else { panic!("expected Pivot") };
        assert_eq!(t.row_ids.len(), 4);
        assert_eq!(t.get(&label_of("1"), &label_of(VARIETY)), Some(2.0));
    }
}
