use lazy_static::lazy_static;
use regex::Regex;

use crate::collections::HashMap;
use crate::error::{SegError, SegResult};
use crate::segment::{byte_to_char_offset, Annotations, Segment};
use crate::segmentation::Segmentation;
use crate::store;

use super::{auto_number, merge_duplicate_segments};

struct TagDescription {
    element: Option<String>,
    is_opening: bool,
    is_empty: bool,
    attributes: Annotations,
}

/// Parses a single xml tag (e.g. `<p class="foo">`, `</p>`, `<br/>`) into
/// its element name, opening/closing/empty-ness, and attributes.
/// Processing instructions and comments (`<!...>`, `<?...>`) parse to
/// `element: None`, which never matches a caller-supplied element name.
///
/// Grounded on `Segmenter.py::_parse_xml_tag`. The source's
/// attribute regex uses a `(?<!\\)` lookbehind plus a `\2` backreference
/// to the quote character to find the matching unescaped quote; the
/// `regex` crate supports neither, so this matches double- and
/// single-quoted attributes as two non-overlapping alternatives instead,
/// without escape-awareness.
fn parse_xml_tag(tag: &str) -> Option<TagDescription> {
    let chars: Vec<char> = tag.chars().collect();
    if chars.len() < 2 {
        return None;
    }
    if chars[1] == '!' || chars[1] == '?' {
        return None;
    }

    let elem = ELEMENT_REGEX.find(tag)?;
    let element = elem.as_str().to_string();

    let mut attributes = Annotations::default();
    for caps in ATTRIBUTE_REGEX.captures_iter(tag) {
        let (key, value) = if let Some(k) = caps.get(1) {
            (k.as_str(), caps.get(2).map(|m| m.as_str()).unwrap_or(""))
        } else {
            (
                caps.get(3).map(|m| m.as_str()).unwrap_or(""),
                caps.get(4).map(|m| m.as_str()).unwrap_or(""),
            )
        };
        attributes.insert(key.to_string(), value.to_string());
    }

    let is_opening = chars[1] != '/';
    let is_empty = chars[chars.len() - 2] == '/';

    Some(TagDescription {
        element: Some(element),
        is_opening,
        is_empty,
        attributes,
    })
}

lazy_static! {
    static ref ELEMENT_REGEX: Regex = Regex::new(r"(\w+)").expect("static regex");
    static ref ATTRIBUTE_REGEX: Regex =
        Regex::new(r#"(\w+)\s*=\s*"([^"]*)"|(\w+)\s*=\s*'([^']*)'"#).expect("static regex");
    static ref TAG_REGEX: Regex = Regex::new(r"</?[^>]+?/?>").expect("static regex");
}

struct PendingSegment {
    str_index: usize,
    start: usize,
    end: Option<usize>,
    annotations: Annotations,
}

fn filter_segment(
    str_index: usize,
    start: usize,
    end: Option<usize>,
    annotations: &Annotations,
    conditions: &HashMap<String, Regex>,
) -> bool {
    let end = end.unwrap_or_else(|| store::resolve_len(str_index));
    if start == end {
        return false;
    }
    for (attr, value_regex) in conditions {
        match annotations.get(attr) {
            Some(value) if value_regex.is_match(value) => {}
            _ => return false,
        }
    }
    true
}

/// Extracts a segment per occurrence of xml `element` found in the
/// content of `segmentation`'s segments, with the element's attributes
/// becoming annotations. A stack-based scan tracks nested open elements
/// across segment boundaries. Empty elements are discarded.
///
/// Grounded on `Segmenter.py::import_xml`.
#[allow(clippy::too_many_arguments)]
pub fn import_xml(
    segmentation: &Segmentation,
    element: &str,
    conditions: &HashMap<String, Regex>,
    import_element_as: Option<&str>,
    label: impl Into<String>,
    import_annotations: bool,
    merge_duplicates: bool,
    auto_number_as: Option<&str>,
    remove_markup: bool,
    preserve_leaves: bool,
    progress_callback: Option<&dyn Fn()>,
) -> SegResult<Segmentation> {
    let element: String = element.chars().filter(|&c| c != '<' && c != '>').collect();

    let mut stack: Vec<Vec<PendingSegment>> = Vec::new();
    let mut attr_stack: Vec<Annotations> = Vec::new();
    let mut temp_segments: Vec<Segment> = Vec::new();

    for old_segment in segmentation.iter() {
        let old_content = old_segment.content();
        let mut old_anno_copy = if import_annotations {
            old_segment.annotations.clone()
        } else {
            Annotations::default()
        };
        if let Some(key) = import_element_as.filter(|k| !k.is_empty()) {
            old_anno_copy.insert(key.to_string(), element.clone());
        }

        let old_str_index = old_segment.str_index;
        let old_start = old_segment.start_or_zero();

        for m in TAG_REGEX.find_iter(&old_content) {
            let tag_start = old_start + byte_to_char_offset(&old_content, m.start());
            let tag_end = old_start + byte_to_char_offset(&old_content, m.end());
            let tag_text = &old_content[m.start()..m.end()];
            let Some(tag_desc) = parse_xml_tag(tag_text) else {
                continue;
            };

            if remove_markup {
                for (index, level) in stack.iter_mut().enumerate() {
                    let last = level.last_mut().expect("every stack level has at least one entry");
                    if last.str_index == old_str_index {
                        last.end = Some(tag_start);
                    } else {
                        let mut anno = old_anno_copy.clone();
                        for (k, v) in &attr_stack[index] {
                            anno.insert(k.clone(), v.clone());
                        }
                        level.push(PendingSegment {
                            str_index: old_str_index,
                            start: 0,
                            end: Some(tag_start),
                            annotations: anno,
                        });
                    }
                }

                if tag_desc.element.as_deref() == Some(element.as_str()) && !tag_desc.is_empty {
                    if tag_desc.is_opening {
                        stack.push(Vec::new());
                        attr_stack.push(tag_desc.attributes);
                    } else if !stack.is_empty() {
                        let popped = stack.pop().expect("checked non-empty");
                        temp_segments.extend(popped.into_iter().filter_map(|s| {
                            filter_segment(s.str_index, s.start, s.end, &s.annotations, conditions)
                                .then(|| Segment::with_annotations(s.str_index, Some(s.start), s.end, s.annotations))
                        }));
                        attr_stack.pop();
                    } else {
                        return Err(SegError::Parse("orphan closing tag".to_string()));
                    }
                }

                for (index, level) in stack.iter_mut().enumerate() {
                    let mut anno = old_anno_copy.clone();
                    for (k, v) in &attr_stack[index] {
                        anno.insert(k.clone(), v.clone());
                    }
                    level.push(PendingSegment {
                        str_index: old_str_index,
                        start: tag_end,
                        end: None,
                        annotations: anno,
                    });
                }
            } else {
                for (index, level) in stack.iter_mut().enumerate() {
                    let needs_fresh = level
                        .last()
                        .map(|last| last.str_index != old_str_index)
                        .unwrap_or(true);
                    if needs_fresh {
                        let mut anno = old_anno_copy.clone();
                        for (k, v) in &attr_stack[index] {
                            anno.insert(k.clone(), v.clone());
                        }
                        level.push(PendingSegment {
                            str_index: old_str_index,
                            start: 0,
                            end: None,
                            annotations: anno,
                        });
                    }
                }

                if tag_desc.element.as_deref() == Some(element.as_str()) && !tag_desc.is_empty {
                    if tag_desc.is_opening {
                        let mut anno = old_anno_copy.clone();
                        for (k, v) in &tag_desc.attributes {
                            anno.insert(k.clone(), v.clone());
                        }
                        stack.push(vec![PendingSegment {
                            str_index: old_str_index,
                            start: tag_end,
                            end: None,
                            annotations: anno,
                        }]);
                        attr_stack.push(tag_desc.attributes);
                    } else if !stack.is_empty() {
                        {
                            let level = stack.last_mut().expect("checked non-empty");
                            let last = level.last_mut().expect("every level has at least one entry");
                            last.end = Some(tag_start);
                        }
                        let popped = stack.pop().expect("checked non-empty");
                        temp_segments.extend(popped.into_iter().filter_map(|s| {
                            filter_segment(s.str_index, s.start, s.end, &s.annotations, conditions)
                                .then(|| Segment::with_annotations(s.str_index, Some(s.start), s.end, s.annotations))
                        }));
                        attr_stack.pop();
                    } else {
                        return Err(SegError::Parse("orphan closing tag".to_string()));
                    }
                }
            }
        }

        if let Some(cb) = progress_callback {
            cb();
        }
    }

    if !stack.is_empty() {
        return Err(SegError::Parse("missing closing tag".to_string()));
    }

    temp_segments.sort_by_key(|s| (s.str_index, s.start_or_zero(), s.end));

    let mut new_segmentation = Segmentation::new(label);
    new_segmentation.extend(temp_segments);

    let mut result = if merge_duplicates {
        merge_duplicate_segments(new_segmentation, preserve_leaves)
    } else {
        new_segmentation
    };

    if let Some(key) = auto_number_as.filter(|k| !k.is_empty()) {
        auto_number(&mut result, key);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_segmentation(xml: &str) -> Segmentation {
        let str_index = store::append_string(xml.to_string());
        let mut seg = Segmentation::new("doc");
        seg.append(Segment::new(str_index, None, None));
        seg
    }

    #[test]
    fn extracts_simple_elements_with_attributes() {
        let seg = make_segmentation("<root><p class=\"a\">one</p><p class=\"b\">two</p></root>");
        let conditions = HashMap::default();
        let result = import_xml(&seg, "p", &conditions, None, "p_tags", true, false, None, false, false, None).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0).content(), "one");
        assert_eq!(result.get(0).annotations.get("class").map(String::as_str), Some("a"));
        assert_eq!(result.get(1).content(), "two");
    }

    #[test]
    fn empty_elements_are_discarded() {
        let seg = make_segmentation("<root><p></p><p>content</p></root>");
        let conditions = HashMap::default();
        let result = import_xml(&seg, "p", &conditions, None, "p_tags", true, false, None, false, false, None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0).content(), "content");
    }

    #[test]
    fn orphan_closing_tag_is_an_error() {
        let seg = make_segmentation("</p>");
        let conditions = HashMap::default();
        let result = import_xml(&seg, "p", &conditions, None, "p_tags", true, false, None, false, false, None);
        assert!(result.is_err());
    }

    #[test]
    fn missing_closing_tag_is_an_error() {
        let seg = make_segmentation("<p>unterminated");
        let conditions = HashMap::default();
        let result = import_xml(&seg, "p", &conditions, None, "p_tags", true, false, None, false, false, None);
        assert!(result.is_err());
    }
}
