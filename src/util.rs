//! Free-standing numeric and sampling helpers (C7) shared by the
//! tabulation kernel: rounding, dictionary resampling, variety/perplexity
//! statistics, and the couple of `Segmentation`-level helpers
//! (`get_unused_char_in_segmentation`, `prepend_unit_with_category`,
//! `generate_random_annotation_key`) that `variety_in_context`'s
//! per-category branch relies on.
//!
//! Grounded on `LTTL/Utils.py`.

use std::cell::RefCell;

use rand::Rng;

use crate::collections::HashMap;
use crate::error::{SegError, SegResult};
use crate::segment::Segment;
use crate::segmentation::Segmentation;

/// Rounds half away from zero (Python 2's `round()`, which the original
/// explicitly reimplements rather than relying on banker's rounding).
pub fn iround(x: f64) -> i64 {
    if x > 0.0 {
        (x + 0.5).floor() as i64
    } else {
        (x - 0.5).ceil() as i64
    }
}

/// Draws a random sub-dictionary of total count `sample_size` from
/// `dictionary`, using the single-pass reservoir-style algorithm of the
/// original (each remaining unit is kept with probability
/// `num_to_sample / num_to_process`, shrinking both counters as units
/// are visited in (arbitrary but stable) key order).
pub fn sample_dict<K: Clone + std::hash::Hash + Eq + Ord>(
    dictionary: &HashMap<K, u64>,
    sample_size: u64,
    rng: &mut impl Rng,
) -> SegResult<HashMap<K, u64>> {
    let mut new_dict: HashMap<K, u64> = HashMap::default();
    let mut num_to_sample = sample_size;
    let mut num_to_process: u64 = dictionary.values().sum();

    let mut keys: Vec<&K> = dictionary.keys().collect();
    keys.sort();

    'outer: for k in keys {
        let v = dictionary[k];
        for _ in 0..v {
            if num_to_sample > 0 && rng.random::<f64>() < (num_to_sample as f64) / (num_to_process as f64) {
                *new_dict.entry(k.clone()).or_insert(0) += 1;
                num_to_sample -= 1;
            }
            num_to_process -= 1;
            if num_to_sample == 0 {
                break 'outer;
            }
        }
    }

    if num_to_sample > 0 {
        return Err(SegError::NotEnoughData(
            "not enough elements in dictionary to draw the requested sample".into(),
        ));
    }
    Ok(new_dict)
}

/// The variety (type count) or perplexity of a frequency dictionary,
/// optionally split into per-category sub-varieties averaged together
/// when `category_delimiter` is set (keys are `"category<delim>unit"`).
pub fn get_variety(
    dictionary: &HashMap<String, u64>,
    unit_weighting: bool,
    category_weighting: bool,
    category_delimiter: Option<&str>,
) -> f64 {
    let Some(delim) = category_delimiter else {
        return if unit_weighting {
            get_perplexity(dictionary)
        } else {
            dictionary.len() as f64
        };
    };

    let mut category_totals: HashMap<String, u64> = HashMap::default();
    let mut units_in_category: HashMap<(String, String), u64> = HashMap::default();

    for (k, &v) in dictionary {
        let (category, unit) = k.split_once(delim).unwrap_or((k.as_str(), ""));
        *category_totals.entry(category.to_string()).or_insert(0) += v;
        *units_in_category
            .entry((category.to_string(), unit.to_string()))
            .or_insert(0) += v;
    }

    if !unit_weighting && !category_weighting {
        return dictionary.len() as f64 / category_totals.len().max(1) as f64;
    }

    let mut varieties = Vec::new();
    let mut weights = Vec::new();
    for (category, total) in &category_totals {
        if category_weighting {
            weights.push(*total as f64);
        }
        let local: HashMap<String, u64> = units_in_category
            .iter()
            .filter(|((c, _), _)| c == category)
            .map(|((_, u), &v)| (u.clone(), v))
            .filter(|(_, v)| *v > 0)
            .collect();
        varieties.push(if unit_weighting {
            get_perplexity(&local)
        } else {
            local.len() as f64
        });
    }

    let weights = if category_weighting { Some(weights) } else { None };
    get_average(&varieties, weights.as_deref()).0
}

/// Weighted mean and standard deviation; equal weights of 1 when
/// `weights` is `None`.
pub fn get_average(values: &[f64], weights: Option<&[f64]>) -> (f64, f64) {
    if values.len() == 1 {
        return (values[0], 0.0);
    }
    let mut sum_of_weights = 0.0;
    let mut weighted_sum = 0.0;
    let mut weighted_sum_squares = 0.0;
    for (i, &value) in values.iter().enumerate() {
        let weight = weights.map(|w| w[i]).unwrap_or(1.0);
        sum_of_weights += weight;
        let weighted = weight * value;
        weighted_sum += weighted;
        weighted_sum_squares += weighted * value;
    }
    let average = weighted_sum / sum_of_weights;
    let variance = (weighted_sum_squares / sum_of_weights - average * average).max(0.0);
    (average, variance.sqrt())
}

/// exp(entropy) of a frequency dictionary.
pub fn get_perplexity(dictionary: &HashMap<String, u64>) -> f64 {
    let mut sum = 0.0;
    let mut weighted_sum_of_logs = 0.0;
    for &freq in dictionary.values() {
        if freq > 0 {
            let freq = freq as f64;
            sum += freq;
            weighted_sum_of_logs += freq * freq.ln();
        }
    }
    (sum.ln() - weighted_sum_of_logs / sum).exp()
}

/// Expected number of distinct types in a random subsample of
/// `subsample_size` drawn (without replacement) from `dictionary`,
/// computed via the standard inclusion-exclusion estimator: for each
/// type, the probability it fails to appear in the subsample is a ratio
/// of binomial coefficients, summed in log-space so the computation
/// stays well-defined for large corpora where the coefficients
/// themselves would overflow any fixed-width integer.
pub fn get_expected_subsample_variety(
    dictionary: &HashMap<String, u64>,
    subsample_size: u64,
) -> SegResult<f64> {
    let sample_size: u64 = dictionary.values().sum();
    if subsample_size > sample_size {
        return Err(SegError::NotEnoughData(
            "not enough elements in dictionary".into(),
        ));
    }
    let mut expected_variety = dictionary.len() as f64;
    for &freq in dictionary.values() {
        expected_variety -= prob_no_occurrence(sample_size, subsample_size, freq);
    }
    Ok(expected_variety)
}

thread_local! {
    static PROB_NO_OCCURRENCE_CACHE: RefCell<HashMap<(u64, u64, u64), f64>> =
        RefCell::new(HashMap::default());
}

fn prob_no_occurrence(sample_size: u64, subsample_size: u64, sample_freq: u64) -> f64 {
    let key = (sample_size, subsample_size, sample_freq);
    if let Some(&cached) = PROB_NO_OCCURRENCE_CACHE.with(|c| c.borrow().get(&key).copied()).as_ref() {
        return cached;
    }

    let value = if sample_freq > sample_size - subsample_size {
        0.0
    } else {
        (ln_binom(sample_size - sample_freq, subsample_size) - ln_binom(sample_size, subsample_size)).exp()
    };

    PROB_NO_OCCURRENCE_CACHE.with(|c| c.borrow_mut().insert(key, value));
    value
}

fn ln_binom(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

fn ln_factorial(n: u64) -> f64 {
    ln_gamma(n as f64 + 1.0)
}

/// Lanczos approximation of ln(Gamma(x)), accurate to ~15 significant
/// digits for x > 0 -- enough precision for the binomial ratios above.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        return (std::f64::consts::PI / (std::f64::consts::PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = COEFFICIENTS[0];
    let t = x + G + 0.5;
    for (i, coeff) in COEFFICIENTS.iter().enumerate().skip(1) {
        a += coeff / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// A Unicode scalar value guaranteed not to appear anywhere in
/// `segmentation`'s contents (or, when `annotation_key` is set, in that
/// annotation's values): one past the highest code point observed.
pub fn get_unused_char_in_segmentation(segmentation: &Segmentation, annotation_key: Option<&str>) -> char {
    let mut global_max: u32 = 0;
    for segment in segmentation.iter() {
        let text = match annotation_key {
            Some(key) => segment.annotation_or_none(key).to_string(),
            None => segment.content(),
        };
        if let Some(local_max) = text.chars().map(|c| c as u32).max() {
            global_max = global_max.max(local_max);
        }
    }
    char::from_u32(global_max + 1).unwrap_or('\u{FFFD}')
}

/// Copies `segmentation`, adding `new_annotation_key` on every segment
/// with value `"{category}{delimiter}{unit}"`, where `unit`/`category`
/// come either from the segment's content or from existing annotations.
pub fn prepend_unit_with_category(
    segmentation: &Segmentation,
    category_delimiter: &str,
    new_annotation_key: &str,
    category_annotation_key: Option<&str>,
    unit_annotation_key: Option<&str>,
) -> Segmentation {
    let mut new_segmentation = Segmentation::new(segmentation.label().to_string());
    for segment in segmentation.iter() {
        let unit = match unit_annotation_key {
            Some(key) => segment.annotation_or_none(key).to_string(),
            None => segment.content(),
        };
        let category = match category_annotation_key {
            Some(key) => segment.annotation_or_none(key).to_string(),
            None => segment.content(),
        };
        let mut annotations = segment.annotations.clone();
        annotations.insert(new_annotation_key.to_string(), format!("{category}{category_delimiter}{unit}"));
        new_segmentation.append(Segment::with_annotations(
            segment.str_index,
            segment.start,
            segment.end,
            annotations,
        ));
    }
    new_segmentation
}

/// A random digit-string annotation key of `length` digits guaranteed
/// not to already be in use on `segmentation`.
pub fn generate_random_annotation_key(segmentation: &Segmentation, length: usize, rng: &mut impl Rng) -> String {
    let existing = segmentation.get_annotation_keys();
    loop {
        let candidate: String = (0..length)
            .map(|_| std::char::from_digit(rng.random_range(0..10), 10).unwrap())
            .collect();
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn iround_matches_half_away_from_zero() {
        assert_eq!(iround(2.5), 3);
        assert_eq!(iround(2.4), 2);
        assert_eq!(iround(-2.5), -3);
    }

    #[test]
    fn get_perplexity_of_uniform_dict_equals_len() {
        let mut dict = HashMap::default();
        dict.insert("a".to_string(), 3u64);
        dict.insert("b".to_string(), 3u64);
        let p = get_perplexity(&dict);
        assert!((p - 2.0).abs() < 1e-9);
    }

    #[test]
    fn get_average_single_value_has_zero_stdev() {
        let (avg, stdev) = get_average(&[5.0], None);
        assert_eq!(avg, 5.0);
        assert_eq!(stdev, 0.0);
    }

    #[test]
    fn sample_dict_exhausts_or_errors() {
        let mut dict = HashMap::default();
        dict.insert("a", 2u64);
        dict.insert("b", 1u64);
        dict.insert("c", 1u64);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
        let sampled = sample_dict(&dict, 2, &mut rng).unwrap();
        let total: u64 = sampled.values().sum();
        assert_eq!(total, 2);

        assert!(sample_dict(&dict, 5, &mut rng).is_err());
    }

    #[test]
    fn expected_subsample_variety_is_between_zero_and_dict_len() {
        let mut dict = HashMap::default();
        dict.insert("a".to_string(), 5u64);
        dict.insert("b".to_string(), 3u64);
        let v = get_expected_subsample_variety(&dict, 4).unwrap();
        assert!(v > 0.0 && v <= 2.0);
    }
}
