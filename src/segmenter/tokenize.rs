use regex::Regex;

use crate::segment::{Annotations, Segment};
use crate::segmentation::Segmentation;

use super::{auto_number, merge_duplicate_segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeMode {
    Tokenize,
    Split,
}

/// One tokenization rule: a regex, whether it describes the desired
/// tokens (`Tokenize`) or the separators between them (`Split`), and an
/// optional annotation key/value template. Templates may reference
/// capture groups with `&N`, exactly like the source's backref syntax.
pub struct TokenRule {
    pub regex: Regex,
    pub mode: TokenizeMode,
    pub annotation: Option<(String, String)>,
}

fn interpolate(template: &str, captures: &regex::Captures) -> String {
    let mut out = String::new();
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '&' {
            let rest = &template[i + 1..];
            let digits: String = rest.chars().take_while(|d| d.is_ascii_digit()).collect();
            if !digits.is_empty() {
                if let Ok(group) = digits.parse::<usize>() {
                    if let Some(m) = captures.get(group) {
                        out.push_str(m.as_str());
                    }
                }
                for _ in 0..digits.len() {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Splits each segment of `segmentation` into new segments per `rules`,
/// applied successively (each rule scans the *original* segment
/// content, not the output of prior rules -- matching the source, which
/// re-matches against `segment.get_content()` for every regex in turn).
#[allow(clippy::too_many_arguments)]
pub fn tokenize(
    segmentation: &Segmentation,
    rules: &[TokenRule],
    label: impl Into<String>,
    import_annotations: bool,
    merge_duplicates: bool,
    auto_number_as: Option<&str>,
    progress_callback: Option<&dyn Fn()>,
) -> Segmentation {
    let mut new_segmentation = Segmentation::new(label);

    let span = tracing::debug_span!("tokenize", rules = rules.len(), segments = segmentation.len());
    let _enter = span.enter();

    for segment in segmentation.iter() {
        let str_index = segment.str_index;
        let start = segment.start_or_zero();
        let content = segment.content();

        let base_annotations: Option<Annotations> = if import_annotations {
            Some(segment.annotations.clone())
        } else {
            None
        };

        let mut new_segments: Vec<Segment> = Vec::new();

        for (rule_idx, rule) in rules.iter().enumerate() {
            tracing::trace!(rule_idx, mode = ?rule.mode, "applying tokenization rule");
            match rule.mode {
                TokenizeMode::Tokenize => {
                    for caps in rule.regex.captures_iter(&content) {
                        let m = caps.get(0).expect("capture 0 is always the whole match");
                        let mut annotations = base_annotations.clone().unwrap_or_default();
                        if let Some((key_tpl, value_tpl)) = &rule.annotation {
                            let key = interpolate(key_tpl, &caps);
                            let value = interpolate(value_tpl, &caps);
                            annotations.insert(key, value);
                        }
                        new_segments.push(Segment::with_annotations(
                            str_index,
                            Some(start + crate::segment::byte_to_char_offset(&content, m.start())),
                            Some(start + crate::segment::byte_to_char_offset(&content, m.end())),
                            annotations,
                        ));
                    }
                }
                TokenizeMode::Split => {
                    let mut annotations = base_annotations.clone().unwrap_or_default();
                    if let Some((key, value)) = &rule.annotation {
                        annotations.insert(key.clone(), value.clone());
                    }

                    let mut previous_end = start;
                    for m in rule.regex.find_iter(&content) {
                        let match_start = start + crate::segment::byte_to_char_offset(&content, m.start());
                        let match_end = start + crate::segment::byte_to_char_offset(&content, m.end());
                        if match_start == previous_end {
                            previous_end = match_end;
                            continue;
                        }
                        new_segments.push(Segment::with_annotations(
                            str_index,
                            Some(previous_end),
                            Some(match_start),
                            annotations.clone(),
                        ));
                        previous_end = match_end;
                    }
                    let segment_end = start + content.chars().count();
                    if previous_end < segment_end {
                        new_segments.push(Segment::with_annotations(
                            str_index,
                            Some(previous_end),
                            Some(segment_end),
                            annotations,
                        ));
                    }
                }
            }
            if let Some(cb) = progress_callback {
                cb();
            }
        }

        new_segments.sort_by_key(|s| (s.str_index, s.start_or_zero(), s.end_or_len()));
        new_segmentation.extend(new_segments);
    }

    let mut result = if merge_duplicates {
        merge_duplicate_segments(new_segmentation, false)
    } else {
        new_segmentation
    };

    if let Some(key) = auto_number_as.filter(|k| !k.is_empty()) {
        auto_number(&mut result, key);
    }

    result
}
