//! Segment (C2): a view (str_index, start, end) over a backing string,
//! plus arbitrary annotations.
//!
//! Grounded on `LTTL/Segment.py`: absent `start`/`end` mean "0" and
//! "length of the resolved string" respectively, equality only looks at
//! the materialized range, and the containment/contained-segments family
//! relies on the owning segmentation's `str_index_ptr` plus a binary
//! search rather than a linear scan.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::collections::HashMap;
use crate::segmentation::Segmentation;
use crate::store;

lazy_static! {
    static ref FORMAT_KEY_REGEX: Regex = Regex::new(r"%\((.+?)\)s").expect("static regex");
}

/// Resolves every `%(key)s` placeholder in `formatting` against `dict`,
/// falling back to `__none__` for unknown keys (mirrors Python's
/// `formatting % segment_dict` with a `default_dict` pre-seeded with
/// `__none__` for every known annotation key).
fn apply_format(formatting: &str, dict: &Annotations) -> String {
    FORMAT_KEY_REGEX
        .replace_all(formatting, |caps: &regex::Captures| {
            dict.get(&caps[1]).cloned().unwrap_or_else(|| NONE_ANNOTATION.to_string())
        })
        .into_owned()
}

pub type AnnotationValue = String;
pub type Annotations = HashMap<String, AnnotationValue>;

pub const NONE_ANNOTATION: &str = "__none__";

/// A single segment: a (str_index, start, end) view plus annotations.
///
/// `start`/`end` are `None` to mean "defaults to 0" / "defaults to the
/// length of the resolved string", matching the Python source's use of
/// `None` as a sentinel rather than baking the resolved length in at
/// construction time (so a segment stays valid if, hypothetically, the
/// same str_index were ever referenced before its final length were
/// known -- in practice strings are immutable once registered, but this
/// keeps `start`/`end` independent of the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub str_index: usize,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub annotations: Annotations,
}

impl Segment {
    pub fn new(str_index: usize, start: Option<usize>, end: Option<usize>) -> Self {
        Self {
            str_index,
            start,
            end,
            annotations: Annotations::default(),
        }
    }

    pub fn with_annotations(
        str_index: usize,
        start: Option<usize>,
        end: Option<usize>,
        annotations: Annotations,
    ) -> Self {
        Self {
            str_index,
            start,
            end,
            annotations,
        }
    }

    pub fn start_or_zero(&self) -> usize {
        self.start.unwrap_or(0)
    }

    pub fn end_or_len(&self) -> usize {
        self.end.unwrap_or_else(|| store::resolve_len(self.str_index))
    }

    /// The str_index this segment's text ultimately lives at, following
    /// at most one redirect hop. Two segments produced by `recode` from
    /// the same original text -- one redirected, one pointing at a fresh
    /// recoded string -- differ in `str_index` but may still be compared
    /// via this to detect they share underlying provenance.
    pub fn real_str_index(&self) -> usize {
        store::real_index(self.str_index)
    }

    /// The substring of the resolved backing string over [start, end).
    pub fn content(&self) -> String {
        let s = store::resolve(self.str_index);
        substring(&s, self.start_or_zero(), self.end_or_len())
    }

    /// Resolves the annotation `key`, falling back to `__none__` when
    /// absent, mirroring every Processor call site's `.get(key, '__none__')`.
    pub fn annotation_or_none(&self, key: &str) -> &str {
        self.annotations
            .get(key)
            .map(|s| s.as_str())
            .unwrap_or(NONE_ANNOTATION)
    }

    /// True iff `other` resolves to the same string and this segment's
    /// range covers `other`'s range.
    pub fn contains(&self, other: &Segment) -> bool {
        if self.str_index != other.str_index {
            return false;
        }
        let self_len = store::resolve_len(self.str_index);
        let other_len = store::resolve_len(other.str_index);
        self.start_or_zero() <= other.start.unwrap_or(0)
            && self.end.unwrap_or(self_len) >= other.end.unwrap_or(other_len)
    }

    /// The segments of `target` whose resolved string equals this
    /// segment's and whose range lies within this segment's range.
    ///
    /// Relies on `target.str_index_ptr` to locate the contiguous run of
    /// same-str_index segments, then a binary search within that run on
    /// the ascending-`(start,end)` invariant. Returns empty if the
    /// precondition (target has no entry for this str_index, or isn't
    /// sorted) means the search can't be trusted -- this mirrors the
    /// Python source's bare `except: return list()`.
    pub fn get_contained_segment_indices(&self, target: &Segmentation) -> Vec<usize> {
        let Some(&first) = target.str_index_ptr().get(&self.str_index) else {
            return Vec::new();
        };

        let self_start = self.start_or_zero();
        let self_end = self.end_or_len();

        // Collect the contiguous run sharing this str_index, starting at
        // `first`. The run is contiguous precisely because segments with
        // a common str_index are grouped together by construction
        // (tokenize/concatenate/import_xml all emit them that way); if
        // that invariant doesn't hold the scan below simply yields
        // nothing useful and an empty vec is the honest answer.
        let mut run = Vec::new();
        let mut idx = first;
        while idx < target.len() {
            let seg = target.get(idx);
            if seg.str_index != self.str_index {
                break;
            }
            run.push((idx, seg));
            idx += 1;
        }
        if run.is_empty() {
            return Vec::new();
        }

        // Binary search for the first run position whose start is >=
        // self_start; "the binary search always ends one position before
        // the first in-range segment; the loop starts at the next index."
        let mut lo = 0usize;
        let mut hi = run.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if run[mid].1.start_or_zero() < self_start {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut out = Vec::new();
        for (idx, seg) in &run[lo..] {
            if seg.start_or_zero() > self_end {
                break;
            }
            if seg.start_or_zero() >= self_start && seg.end_or_len() <= self_end {
                out.push(*idx);
            }
        }
        out
    }

    pub fn get_contained_segments(&self, target: &Segmentation) -> Vec<Segment> {
        self.get_contained_segment_indices(target)
            .into_iter()
            .map(|i| target.get(i))
            .collect()
    }

    /// Among the indices contained in this segment, the starts of every
    /// run of `length` indices that are contiguous in `target`'s
    /// underlying sequence.
    pub fn get_contained_sequence_indices(&self, target: &Segmentation, length: usize) -> Vec<usize> {
        if length == 0 {
            return Vec::new();
        }
        let contained = self.get_contained_segment_indices(target);
        if contained.is_empty() {
            return Vec::new();
        }

        // Group into runs of indices consecutive in the underlying
        // sequence (idx - position_in_contained is constant within a run,
        // the same trick as `itertools.groupby` keyed on that difference
        // in the Python source).
        let mut runs: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = vec![contained[0]];
        for &idx in &contained[1..] {
            if idx == *current.last().unwrap() + 1 {
                current.push(idx);
            } else {
                runs.push(std::mem::take(&mut current));
                current.push(idx);
            }
        }
        runs.push(current);

        let mut starts = Vec::new();
        for run in runs {
            if run.len() < length {
                continue;
            }
            for start in 0..=(run.len() - length) {
                starts.push(run[start]);
            }
        }
        starts
    }

    /// Deep-copies the annotation dict. When `update` is true, copies
    /// `self.annotations` and merges `new` on top (new wins on key
    /// conflict); new values replace old on shared keys. When false,
    /// returns a fresh dict containing only `new` (or empty if `new` is
    /// `None`).
    /// Renders this segment either through `formatting` (with
    /// `%(key)s` placeholders resolved against its annotations plus the
    /// synthesized `__num__`/`__content__`/`__str_index__`/`__start__`/
    /// `__end__` keys and their `_raw__` un-humanized counterparts), or,
    /// with no formatting, as a fixed "segment number N ..." block.
    ///
    /// Grounded on `Segment.py::to_string`.
    pub fn to_display_string(&self, formatting: Option<&str>, humanize_addresses: bool, segment_count: usize, default_dict: Option<&Annotations>) -> String {
        let offset = if humanize_addresses { 1 } else { 0 };
        let str_index = self.str_index + offset;
        let start = self.start_or_zero() + offset;
        let end = self.end_or_len();

        if let Some(formatting) = formatting {
            let mut dict = default_dict.cloned().unwrap_or_default();
            for (k, v) in &self.annotations {
                dict.insert(k.clone(), v.clone());
            }
            dict.insert("__num__".to_string(), segment_count.to_string());
            dict.insert("__content__".to_string(), self.content());
            dict.insert("__str_index__".to_string(), str_index.to_string());
            dict.insert("__start__".to_string(), start.to_string());
            dict.insert("__end__".to_string(), end.to_string());
            dict.insert("__str_index_raw__".to_string(), self.str_index.to_string());
            dict.insert("__start_raw__".to_string(), self.start_or_zero().to_string());
            dict.insert("__end_raw__".to_string(), end.to_string());
            apply_format(formatting, &dict)
        } else {
            let mut out = format!(
                "segment number {segment_count}\n\tcontent:\t\"{}\"\n\tstr_index:\t{str_index}\n\tstart:\t{start}\n\tend:\t{end}",
                self.content(),
            );
            if !self.annotations.is_empty() {
                out.push_str("\n\tannotations:\n");
                let lines: Vec<String> = sorted_annotations(&self.annotations)
                    .into_iter()
                    .map(|(k, v)| format!("\t\t{k:<20} {v}"))
                    .collect();
                out.push_str(&lines.join("\n"));
            }
            out
        }
    }

    /// Renders this segment as one HTML `<table>` fragment: a header
    /// with its index and address, an optional annotation section, and
    /// its content with `<`/`>`/`\n` escaped for display.
    ///
    /// Grounded on `Segment.py::to_html`.
    pub fn to_html_fragment(&self, offset: usize, counter: usize) -> String {
        let str_index = self.str_index + offset;
        let start = self.start_or_zero() + offset;
        let end = self.end_or_len();

        let mut out = format!("<a name=\"{counter}\"/>\n");
        out.push_str(&format!(
            "<table width=\"100%\">\n<tr><td class=\"h\" colspan=\"2\">Segment #{counter}&nbsp;&nbsp;[{str_index}:{start}-{end}]</td></tr>"
        ));

        if !self.annotations.is_empty() {
            for (k, v) in sorted_annotations(&self.annotations) {
                out.push_str(&format!("<tr><td class=\"k\">{k}</td><td class=\"v\" width=\"100%\">{v}</td></tr>\n"));
            }
        }

        let content = self.content().replace('<', "&lt;").replace('>', "&gt;").replace('\n', "<br/>");
        out.push_str(&format!("<tr><td colspan=\"2\">{content}</td></tr></table>"));
        out
    }

    pub fn deepcopy_annotations(&self, update: bool, new: Option<&Annotations>) -> Annotations {
        if update {
            let mut merged = self.annotations.clone();
            if let Some(new) = new {
                for (k, v) in new {
                    merged.insert(k.clone(), v.clone());
                }
            }
            merged
        } else {
            new.cloned().unwrap_or_default()
        }
    }
}

fn substring(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Converts a byte offset into `s` (as produced by the `regex` crate,
/// which matches over UTF-8 bytes) into the character offset our
/// segments use throughout. Segmenter transforms that scan segment
/// content with a regex must run their match offsets through this
/// before building new segments.
pub fn byte_to_char_offset(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset].chars().count()
}

/// Ordered annotation rendering helper used by `to_string`/`to_html`
/// (§6): annotations are rendered key-sorted for determinism.
pub fn sorted_annotations(annotations: &Annotations) -> BTreeMap<&str, &str> {
    annotations.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}
