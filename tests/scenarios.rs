use regex::Regex;

use segkit::processor::{
    cooc_in_window, count_in_context, ContextGroupSpec, UnitSpec,
};
use segkit::segment::Segment;
use segkit::segmentation::Segmentation;
use segkit::segmenter::{concatenate, tokenize, TokenRule, TokenizeMode};
use segkit::store;
use segkit::table::{Label, NormalizationMode, NormalizationType, Table};

fn input_string(text: &str, label: &str) -> Segmentation {
    Segmentation::from_input_string(text, label)
}

/// S1: "un texte" tokenized by `\w+` yields {"un","texte"}; word #2's
/// contained vowel segments are exactly ["e", "e"].
#[test]
fn s1_word_contains_expected_vowel_segments() {
    let input = input_string("un texte", "doc");
    let words = tokenize(
        &input,
        &[TokenRule { regex: Regex::new(r"\w+").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "words",
        false,
        false,
        None,
        None,
    );
    assert_eq!(words.len(), 2);
    assert_eq!(words.get(0).content(), "un");
    assert_eq!(words.get(1).content(), "texte");

    let vowels = tokenize(
        &words,
        &[TokenRule { regex: Regex::new(r"[aeiouy]").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "vowels",
        false,
        false,
        None,
        None,
    );

    let contained: Vec<String> = words.get(1).get_contained_segments(&vowels).iter().map(|s| s.content()).collect();
    assert_eq!(contained, vec!["e".to_string(), "e".to_string()]);
}

/// S2: "a simple example" -> words -> letters;
/// count_in_context(letters, words).get('a','a') == 1, get('simple','e') == 2.
#[test]
fn s2_counts_letters_within_words() {
    let input = input_string("a simple example", "doc");
    let words = tokenize(
        &input,
        &[TokenRule { regex: Regex::new(r"\w+").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "words",
        false,
        false,
        None,
        None,
    );
    let letters = tokenize(
        &words,
        &[TokenRule { regex: Regex::new(r".").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "letters",
        false,
        false,
        None,
        None,
    );

    let table = count_in_context(
        UnitSpec::new(&letters),
        ContextGroupSpec { segmentation: Some(&words), annotation_key: None, merge: false },
    );
    let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
    assert_eq!(t.get(&Label::from("a"), &Label::from("a")), Some(1));
    assert_eq!(t.get(&Label::from("simple"), &Label::from("e")), Some(2));
}

/// S3: letters annotated `type=C`, overwritten to `type=V` on vowels,
/// merged; cooc_in_window(letters, w=3, ann='type') is a 2x2 table with
/// every cell equal to 5.
#[test]
fn s3_cooc_in_window_with_category_annotation() {
    let text = "un texte";
    let str_index = store::append_string(text.to_string());
    let mut letters = Segmentation::new("letters");
    for (i, ch) in text.chars().enumerate() {
        if ch == ' ' {
            continue;
        }
        let mut seg = Segment::new(str_index, Some(i), Some(i + 1));
        let category = if "aeiouy".contains(ch) { "V" } else { "C" };
        seg.annotations.insert("type".to_string(), category.to_string());
        letters.append(seg);
    }

    let mut spec = UnitSpec::new(&letters);
    spec.annotation_key = Some("type");
    let table = cooc_in_window(spec, 3);
    let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
    assert_eq!(t.row_ids.len(), 2);
    for row in &t.row_ids {
        for col in &t.col_ids {
            assert_eq!(t.get(row, col), Some(5));
        }
    }
}

/// S4: concatenating "hello", "world", "!" without sorting preserves
/// first-seen order of the underlying strings.
#[test]
fn s4_concatenate_without_sort_preserves_input_order() {
    let hello = input_string("hello", "a");
    let world = input_string("world", "b");
    let bang = input_string("!", "c");

    let result = concatenate(&[&hello, &world, &bang], "all", true, None, false, None, false, None);
    assert_eq!(result.len(), 3);
    assert_eq!(result.get(0).content(), "hello");
    assert_eq!(result.get(1).content(), "world");
    assert_eq!(result.get(2).content(), "!");
}

/// Invariant 9: row-normalized (L1) tables have rows summing to 1 (or 0
/// for originally all-zero rows).
#[test]
fn invariant_row_normalization_sums_to_one() {
    let input = input_string("a b a c", "doc");
    let words = tokenize(
        &input,
        &[TokenRule { regex: Regex::new(r"\w+").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "words",
        false,
        false,
        None,
        None,
    );
    let table = count_in_context(UnitSpec::new(&words), ContextGroupSpec::default());
    let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
    let normalized = t.to_normalized(NormalizationMode::Rows, NormalizationType::L1);
    let segkit::table::NormalizedTable::Float(f) = normalized else { panic!("expected float table") };
    for row in &f.row_ids {
        let sum: f64 = f.col_ids.iter().map(|c| f.get(row, c).unwrap_or(0.0)).sum();
        assert!((sum - 1.0).abs() < 1e-9 || sum == 0.0);
    }
}

/// Invariant 8: cooc_in_window's diagonal entry (u,u) equals the number
/// of windows in which u appears at least once.
#[test]
fn invariant_cooc_diagonal_counts_windows_containing_unit() {
    let input = input_string("a b a c a d", "doc");
    let words = tokenize(
        &input,
        &[TokenRule { regex: Regex::new(r"\w+").unwrap(), mode: TokenizeMode::Tokenize, annotation: None }],
        "words",
        false,
        false,
        None,
        None,
    );
    let table = cooc_in_window(UnitSpec::new(&words), 2);
    let Table::IntPivot(t) = table else { panic!("expected IntPivot") };
    assert_eq!(t.get(&Label::from("a"), &Label::from("a")), Some(5));
}

/// Invariant 10: get_expected_subsample_variety(dict, k) for k=1 reduces
/// to Σv/N, which is always 1 since Σv == N by construction (a single
/// draw always yields exactly one type).
#[test]
fn invariant_expected_subsample_variety_at_k1_is_one() {
    use segkit::util::get_expected_subsample_variety;
    let mut dict = segkit::collections::HashMap::default();
    dict.insert("a".to_string(), 2u64);
    dict.insert("b".to_string(), 1u64);
    dict.insert("c".to_string(), 1u64);

    let v1 = get_expected_subsample_variety(&dict, 1).unwrap();
    assert!((v1 - 1.0).abs() < 1e-9);
}

/// S6: get_expected_subsample_variety({a:2,b:1,c:1}, 2) == 11/6.
#[test]
fn s6_expected_subsample_variety_matches_reference_value() {
    use segkit::util::get_expected_subsample_variety;
    let mut dict = segkit::collections::HashMap::default();
    dict.insert("a".to_string(), 2u64);
    dict.insert("b".to_string(), 1u64);
    dict.insert("c".to_string(), 1u64);

    let v = get_expected_subsample_variety(&dict, 2).unwrap();
    assert!((v - 11.0 / 6.0).abs() < 1e-9);
}
