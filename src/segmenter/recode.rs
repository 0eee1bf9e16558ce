use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{SegError, SegResult};
use crate::segment::Segment;
use crate::segmentation::Segmentation;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

lazy_static! {
    static ref BACKREF_REGEX: Regex = Regex::new(r"&(?=[0-9]+)").expect("static regex");
}

/// Converts this crate's `&N` backreference syntax into the `regex`
/// crate's `${N}` replacement syntax.
fn convert_backrefs(replacement: &str) -> String {
    BACKREF_REGEX.replace_all(replacement, "$$").into_owned()
}

/// Recodes the string(s) underlying `segmentation`'s segments: optional
/// case change and accent stripping (applied first), followed by regex
/// substitutions (applied in order). Returns the recoded segmentation
/// plus the total number of substitutions performed across all segments.
///
/// Grounded on `Segmenter.py::recode`. When a segment's content is
/// unmodified but the segment immediately before it (sharing the same
/// underlying string) *was* modified, the unmodified segment is given a
/// fresh str_index that redirects to the original -- this is what lets
/// the output segmentation's segments each resolve to the right text
/// even though only the modified ones got a new concrete string.
#[allow(clippy::too_many_arguments)]
pub fn recode(
    segmentation: &Segmentation,
    substitutions: &[(Regex, String)],
    case: Option<Case>,
    remove_accents: bool,
    label: impl Into<String>,
    copy_annotations: bool,
    progress_callback: Option<&dyn Fn()>,
) -> SegResult<(Segmentation, u64)> {
    if !segmentation.is_non_overlapping() {
        return Err(SegError::Configuration(
            "cannot apply recoder to overlapping segmentation".to_string(),
        ));
    }

    let label = label.into();
    let mut new_segmentation = Segmentation::new(label.clone());

    let mut last_recoded = false;
    let mut old_str_index: Option<usize> = None;
    let mut new_str_index: Option<usize> = None;
    let mut total_num_subs: u64 = 0;

    for segment in segmentation.iter() {
        let original_text = segment.content();
        let mut recoded_text = match case {
            Some(Case::Lower) => original_text.to_lowercase(),
            Some(Case::Upper) => original_text.to_uppercase(),
            None => original_text.clone(),
        };

        if remove_accents {
            recoded_text = recoded_text.nfd().filter(|c| !is_combining_mark(*c)).collect();
        }

        for (pattern, replacement) in substitutions {
            let converted = convert_backrefs(replacement);
            let mut num_subs_this_rule = 0u64;
            recoded_text = pattern
                .replace_all(&recoded_text, |caps: &regex::Captures| {
                    num_subs_this_rule += 1;
                    let mut expanded = String::new();
                    caps.expand(&converted, &mut expanded);
                    expanded
                })
                .into_owned();
            total_num_subs += num_subs_this_rule;
        }

        if recoded_text != original_text {
            let fresh_str_index = store::append_string(recoded_text);
            let annotations = segment.deepcopy_annotations(copy_annotations, None);
            new_segmentation.append(Segment::with_annotations(fresh_str_index, None, None, annotations));
            last_recoded = true;
        } else {
            if last_recoded && old_str_index == Some(segment.str_index) {
                new_str_index = Some(store::append_redirect(old_str_index.expect("checked Some above")));
            }
            if old_str_index != Some(segment.str_index) {
                old_str_index = Some(segment.str_index);
                new_str_index = Some(segment.str_index);
            }

            let annotations = segment.deepcopy_annotations(copy_annotations, None);
            new_segmentation.append(Segment::with_annotations(
                new_str_index.expect("set immediately above"),
                segment.start,
                segment.end,
                annotations,
            ));
            last_recoded = false;
        }

        if let Some(cb) = progress_callback {
            cb();
        }
    }

    Ok((new_segmentation, total_num_subs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_segment(text: &str) -> Segmentation {
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("doc");
        seg.append(Segment::new(str_index, None, None));
        seg
    }

    #[test]
    fn lowercases_content() {
        let seg = single_segment("HELLO World");
        let (result, subs) = recode(&seg, &[], Some(Case::Lower), false, "lc", true, None).unwrap();
        assert_eq!(result.get(0).content(), "hello world");
        assert_eq!(subs, 0);
    }

    #[test]
    fn strips_accents() {
        let seg = single_segment("café");
        let (result, _subs) = recode(&seg, &[], None, true, "noacc", true, None).unwrap();
        assert_eq!(result.get(0).content(), "cafe");
    }

    #[test]
    fn applies_substitutions_with_backreferences() {
        let seg = single_segment("foo bar");
        let pattern = Regex::new(r"(\w+) (\w+)").unwrap();
        let (result, subs) = recode(&seg, &[(pattern, "&2 &1".to_string())], None, false, "swap", true, None).unwrap();
        assert_eq!(result.get(0).content(), "bar foo");
        assert_eq!(subs, 1);
    }

    #[test]
    fn unmodified_segment_recurring_after_a_modified_sibling_gets_a_redirect() {
        let text = "foo BAR foo";
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("doc");
        seg.append(Segment::new(str_index, Some(0), Some(3)));
        seg.append(Segment::new(str_index, Some(4), Some(7)));
        seg.append(Segment::new(str_index, Some(8), Some(11)));
        let (result, _subs) = recode(&seg, &[], Some(Case::Lower), false, "lc", true, None).unwrap();
        assert_eq!(result.get(0).content(), "foo");
        assert_eq!(result.get(0).str_index, str_index);
        assert_eq!(result.get(1).content(), "bar");
        assert_ne!(result.get(1).str_index, str_index);
        assert_eq!(result.get(2).content(), "foo");
        assert_ne!(result.get(2).str_index, str_index);
        assert_eq!(store::real_index(result.get(2).str_index), str_index);
    }

    #[test]
    fn overlapping_segmentation_is_rejected() {
        let text = "abcdef";
        let str_index = store::append_string(text.to_string());
        let mut seg = Segmentation::new("doc");
        seg.append(Segment::new(str_index, Some(0), Some(4)));
        seg.append(Segment::new(str_index, Some(2), Some(6)));
        let result = recode(&seg, &[], Some(Case::Lower), false, "lc", true, None);
        assert!(result.is_err());
    }
}
