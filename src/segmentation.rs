//! Segmentation (C3): an ordered sequence of segments, chunk-paged with
//! LRU spill to temporary files, plus a `str_index -> first position`
//! map used by `Segment::get_contained_segment_indices`.
//!
//! Grounded on `LTTL/Segmentation.py`. The original keeps its page cache
//! as a single module-level dict keyed by `(segmentation, page_id)`,
//! which is really just CPython's way of giving every `Segmentation`
//! object access to a shared LRU without each one owning its own queue.
//! In Rust that cross-instance sharing would require every segmentation
//! to live behind `Rc<RefCell<_>>`, which would leak into the whole
//! public API for no behavioral benefit external callers depend on (the
//! "global-ness" of the cache was never part of the observable
//! contract -- only "bounded resident pages, LRU eviction, spill to
//! temp files, cleanup on drop" is). So each `Segmentation` owns its own
//! bounded LRU instead; the paging/spill/reload machinery is otherwise
//! implemented in full, including temp-file cleanup on `Drop`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tempfile::NamedTempFile;

use crate::collections::HashMap;
use crate::config::PagingConfig;
use crate::segment::{Annotations, Segment};
use crate::store;

const NONE_SENTINEL: u64 = u64::MAX;

/// Above this many segments, `to_string`/`to_html` render only the
/// first/last `NUM_SEGMENTS_SUMMARY` by default.
const MAX_SEGMENT_STRING: usize = 1000;
const NUM_SEGMENTS_SUMMARY: usize = 5;

fn next_segmentation_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

#[derive(Debug, Clone)]
struct RawRow {
    str_index: usize,
    start: u64,
    end: u64,
    ann_ids: Vec<u32>,
}

impl RawRow {
    fn from_segment(seg: &Segment, interner: &mut Interner) -> Self {
        let ann_ids = interner.intern_all(&seg.annotations);
        RawRow {
            str_index: seg.str_index,
            start: seg.start.map(|v| v as u64).unwrap_or(NONE_SENTINEL),
            end: seg.end.map(|v| v as u64).unwrap_or(NONE_SENTINEL),
            ann_ids,
        }
    }

    fn to_segment(&self, interner: &Interner) -> Segment {
        let start = if self.start == NONE_SENTINEL {
            None
        } else {
            Some(self.start as usize)
        };
        let end = if self.end == NONE_SENTINEL {
            None
        } else {
            Some(self.end as usize)
        };
        let mut annotations = Annotations::default();
        for &id in &self.ann_ids {
            let (k, v) = interner.resolve(id);
            annotations.insert(k.to_string(), v.to_string());
        }
        Segment::with_annotations(self.str_index, start, end, annotations)
    }

    fn encode_line(&self) -> String {
        let mut line = format!("{}\t{}\t{}", self.str_index, self.start, self.end);
        for id in &self.ann_ids {
            line.push('\t');
            line.push_str(&id.to_string());
        }
        line
    }

    fn decode_line(line: &str) -> Self {
        let mut parts = line.split('\t');
        let str_index = parts.next().unwrap().parse().unwrap();
        let start = parts.next().unwrap().parse().unwrap();
        let end = parts.next().unwrap().parse().unwrap();
        let ann_ids = parts.map(|p| p.parse().unwrap()).collect();
        RawRow {
            str_index,
            start,
            end,
            ann_ids,
        }
    }
}

/// Per-segmentation interning table for (key, value) annotation pairs,
/// so sealed pages store small integer ids rather than repeated strings.
#[derive(Debug, Default)]
struct Interner {
    to_id: HashMap<(String, String), u32>,
    from_id: Vec<(String, String)>,
}

impl Interner {
    fn intern(&mut self, key: &str, value: &str) -> u32 {
        if let Some(&id) = self.to_id.get(&(key.to_string(), value.to_string())) {
            return id;
        }
        let id = self.from_id.len() as u32;
        self.from_id.push((key.to_string(), value.to_string()));
        self.to_id.insert((key.to_string(), value.to_string()), id);
        id
    }

    fn intern_all(&mut self, annotations: &Annotations) -> Vec<u32> {
        let mut ids: Vec<u32> = annotations
            .iter()
            .map(|(k, v)| self.intern(k, v))
            .collect();
        ids.sort_unstable();
        ids
    }

    fn resolve(&self, id: u32) -> (&str, &str) {
        let (k, v) = &self.from_id[id as usize];
        (k.as_str(), v.as_str())
    }

    fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.from_id.iter().map(|(k, _)| k.as_str())
    }
}

enum PageSlot {
    Resident(Vec<RawRow>),
    Spilled { file: NamedTempFile, rows: usize },
}

impl PageSlot {
    fn row_count(&self) -> usize {
        match self {
            PageSlot::Resident(rows) => rows.len(),
            PageSlot::Spilled { rows, .. } => *rows,
        }
    }
}

pub struct Segmentation {
    id: u64,
    label: String,
    paging: PagingConfig,
    len: usize,
    str_index_ptr: HashMap<usize, usize>,
    interner: RefCell<Interner>,
    sealed: RefCell<Vec<PageSlot>>,
    buffer: RefCell<Vec<RawRow>>,
    /// Resident sealed page indices, recency order (front = least recent).
    lru: RefCell<VecDeque<usize>>,
}

impl Segmentation {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_paging(label, PagingConfig::default())
    }

    pub fn with_paging(label: impl Into<String>, paging: PagingConfig) -> Self {
        Self {
            id: next_segmentation_id(),
            label: label.into(),
            paging,
            len: 0,
            str_index_ptr: HashMap::default(),
            interner: RefCell::new(Interner::default()),
            sealed: RefCell::new(Vec::new()),
            buffer: RefCell::new(Vec::new()),
            lru: RefCell::new(VecDeque::new()),
        }
    }

    /// The "Input" creator (§6): registers `s` as a fresh concrete string
    /// and returns a one-segment segmentation covering it entirely.
    pub fn from_input_string(s: impl Into<String>, label: impl Into<String>) -> Self {
        let str_index = store::append_string(s);
        let mut seg = Segmentation::new(label);
        seg.append(Segment::new(str_index, None, None));
        seg
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn str_index_ptr(&self) -> &HashMap<usize, usize> {
        &self.str_index_ptr
    }

    pub fn get_annotation_keys(&self) -> std::collections::BTreeSet<String> {
        self.interner
            .borrow()
            .all_keys()
            .map(|s| s.to_string())
            .collect()
    }

    fn pages_per_sealed(&self) -> usize {
        self.paging.chunk_size
    }

    /// Ensures the sealed page at `page_idx` is resident, evicting the
    /// least-recently-used resident page (spilling it to a temp file) if
    /// this brings residency over `cache_size`.
    fn ensure_resident(&self, page_idx: usize) {
        {
            let sealed = self.sealed.borrow();
            if matches!(sealed[page_idx], PageSlot::Resident(_)) {
                self.touch(page_idx);
                return;
            }
        }

        tracing::debug!(page_idx, "reloading spilled page");

        // Reload from temp file.
        let rows = {
            let mut sealed = self.sealed.borrow_mut();
            let slot = std::mem::replace(
                &mut sealed[page_idx],
                PageSlot::Resident(Vec::new()),
            );
            match slot {
                PageSlot::Spilled { file, rows: n } => {
                    let reader = BufReader::new(file.reopen().expect("reopen spilled page"));
                    let mut parsed = Vec::with_capacity(n);
                    for line in reader.lines() {
                        let line = line.expect("read spilled page line");
                        if line.is_empty() {
                            continue;
                        }
                        parsed.push(RawRow::decode_line(&line));
                    }
                    parsed
                }
                PageSlot::Resident(rows) => rows,
            }
        };
        let reloaded = rows.len();
        self.sealed.borrow_mut()[page_idx] = PageSlot::Resident(rows);
        self.touch(page_idx);
        self.evict_if_needed();
        tracing::trace!(page_idx, reloaded, "page resident");
    }

    fn touch(&self, page_idx: usize) {
        let mut lru = self.lru.borrow_mut();
        lru.retain(|&p| p != page_idx);
        lru.push_back(page_idx);
    }

    fn evict_if_needed(&self) {
        loop {
            let resident_count = self
                .sealed
                .borrow()
                .iter()
                .filter(|s| matches!(s, PageSlot::Resident(_)))
                .count();
            if resident_count <= self.paging.cache_size.max(1) {
                break;
            }
            let victim = {
                let mut lru = self.lru.borrow_mut();
                match lru.pop_front() {
                    Some(p) => p,
                    None => break,
                }
            };
            self.spill(victim);
        }
    }

    fn spill(&self, page_idx: usize) {
        let mut sealed = self.sealed.borrow_mut();
        let slot = std::mem::replace(&mut sealed[page_idx], PageSlot::Resident(Vec::new()));
        if let PageSlot::Resident(rows) = slot {
            let mut file = NamedTempFile::new().expect("create spill temp file");
            for row in &rows {
                writeln!(file, "{}", row.encode_line()).expect("write spill page");
            }
            file.flush().expect("flush spill page");
            let n = rows.len();
            tracing::debug!(page_idx, rows = n, "spilling page to disk");
            sealed[page_idx] = PageSlot::Spilled { file, rows: n };
        } else {
            sealed[page_idx] = slot;
        }
    }

    fn seal_buffer_if_full(&mut self) {
        let should_seal = self.buffer.borrow().len() >= self.pages_per_sealed();
        if !should_seal {
            return;
        }
        let rows = std::mem::take(&mut *self.buffer.borrow_mut());
        let page_idx = self.sealed.borrow().len();
        self.sealed.borrow_mut().push(PageSlot::Resident(rows));
        self.touch(page_idx);
        self.evict_if_needed();
    }

    pub fn append(&mut self, segment: Segment) {
        self.str_index_ptr.entry(segment.str_index).or_insert(self.len);
        let row = {
            let mut interner = self.interner.borrow_mut();
            RawRow::from_segment(&segment, &mut interner)
        };
        self.buffer.borrow_mut().push(row);
        self.len += 1;
        self.seal_buffer_if_full();
    }

    pub fn extend(&mut self, segments: impl IntoIterator<Item = Segment>) {
        for seg in segments {
            self.append(seg);
        }
    }

    /// Overwrites the last segment in place (used by transforms that
    /// merge a freshly-appended segment into its predecessor, such as
    /// `concatenate`'s `merge_duplicates` pass).
    pub fn replace_last(&mut self, segment: Segment) {
        assert!(self.len > 0, "replace_last called on an empty segmentation");
        let row = {
            let mut interner = self.interner.borrow_mut();
            RawRow::from_segment(&segment, &mut interner)
        };

        let mut buffer = self.buffer.borrow_mut();
        if !buffer.is_empty() {
            let last = buffer.len() - 1;
            buffer[last] = row;
            return;
        }
        drop(buffer);

        let page_idx = self.sealed.borrow().len() - 1;
        self.ensure_resident(page_idx);
        let mut sealed = self.sealed.borrow_mut();
        let PageSlot::Resident(rows) = &mut sealed[page_idx] else {
            unreachable!("just ensured resident")
        };
        let last = rows.len() - 1;
        rows[last] = row;
    }

    /// Returns a detached copy of the segment at `index`.
    pub fn get(&self, index: usize) -> Segment {
        assert!(index < self.len, "segment index {index} out of bounds ({})", self.len);

        let sealed_len = self.sealed.borrow().len();
        let sealed_rows: usize = self
            .sealed
            .borrow()
            .iter()
            .map(|s| s.row_count())
            .sum();

        if index < sealed_rows {
            let mut remaining = index;
            for page_idx in 0..sealed_len {
                let page_rows = self.sealed.borrow()[page_idx].row_count();
                if remaining < page_rows {
                    self.ensure_resident(page_idx);
                    let sealed = self.sealed.borrow();
                    let PageSlot::Resident(rows) = &sealed[page_idx] else {
                        unreachable!("just ensured resident")
                    };
                    return rows[remaining].to_segment(&self.interner.borrow());
                }
                remaining -= page_rows;
            }
            unreachable!("index within sealed_rows but not found in any page")
        } else {
            let buf_idx = index - sealed_rows;
            let buffer = self.buffer.borrow();
            buffer[buf_idx].to_segment(&self.interner.borrow())
        }
    }

    pub fn iter(&self) -> SegmentationIter<'_> {
        SegmentationIter {
            segmentation: self,
            next: 0,
        }
    }

    /// Returns a new segmentation with the same segments reordered
    /// stably by `(str_index, start, end)`. If already sorted, the copy
    /// is made without actually reordering anything.
    pub fn sorted(&self) -> Segmentation {
        let mut indexed: Vec<(usize, Segment)> = self.iter().enumerate().collect();
        let already_sorted = indexed.windows(2).all(|w| sort_key(&w[0].1) <= sort_key(&w[1].1));

        if !already_sorted {
            indexed.sort_by(|a, b| sort_key(&a.1).cmp(&sort_key(&b.1)));
        }

        let mut out = Segmentation::with_paging(self.label.clone(), self.paging);
        out.extend(indexed.into_iter().map(|(_, s)| s));
        out
    }

    pub fn is_sorted(&self) -> bool {
        self.iter()
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| sort_key(&w[0]) <= sort_key(&w[1]))
    }

    /// Quadratic pairwise sweep (after sorting) checking that no two
    /// segments sharing a str_index overlap.
    pub fn is_non_overlapping(&self) -> bool {
        let sorted = self.sorted();
        let segs: Vec<Segment> = sorted.iter().collect();
        for i in 0..segs.len() {
            for j in (i + 1)..segs.len() {
                let a = &segs[i];
                let b = &segs[j];
                if a.str_index != b.str_index {
                    continue;
                }
                let a_end = a.end_or_len();
                if b.start_or_zero() < a_end {
                    return false;
                }
            }
        }
        true
    }

    fn default_annotation_dict(&self) -> Annotations {
        self.get_annotation_keys()
            .into_iter()
            .map(|k| (k, crate::segment::NONE_ANNOTATION.to_string()))
            .collect()
    }

    /// Renders every segment, one per `segment_delimiter`, wrapped in
    /// `header`/`footer`. Beyond `MAX_SEGMENT_STRING` segments (unless
    /// `display_all` forces it), only the first and last
    /// `NUM_SEGMENTS_SUMMARY` are rendered, with a notice in between.
    ///
    /// Grounded on `Segmentation.py::to_string`.
    pub fn to_string(
        &self,
        formatting: Option<&str>,
        segment_delimiter: &str,
        header: &str,
        footer: &str,
        humanize_addresses: bool,
        display_all: Option<bool>,
    ) -> String {
        let display_all = display_all.unwrap_or(self.len <= MAX_SEGMENT_STRING);
        let default_dict = formatting.map(|_| self.default_annotation_dict());

        let render = |index: usize| {
            self.get(index)
                .to_display_string(formatting, humanize_addresses, index + 1, default_dict.as_ref())
        };

        let mut out = header.to_string();
        if display_all {
            let rendered: Vec<String> = (0..self.len).map(render).collect();
            out.push_str(&rendered.join(segment_delimiter));
        } else {
            let head: Vec<String> = (0..self.len.min(NUM_SEGMENTS_SUMMARY)).map(render).collect();
            out.push_str(&head.join(segment_delimiter));
            out.push_str(&format!("\n\n[{} segments not displayed...]\n\n", self.len - 2 * NUM_SEGMENTS_SUMMARY));
            let tail: Vec<String> = (self.len.saturating_sub(NUM_SEGMENTS_SUMMARY)..self.len).map(render).collect();
            out.push_str(&tail.join(segment_delimiter));
        }
        out.push_str(footer);
        out
    }

    /// Renders the segmentation as a standalone HTML document: a fixed
    /// CSS preamble, an `<h2>` with the label, then one `<table>`
    /// fragment per segment (summarized beyond `MAX_SEGMENT_STRING`
    /// segments the same way as `to_string`).
    ///
    /// Grounded on `Segmentation.py::to_html`.
    pub fn to_html(&self, humanize_addresses: bool, display_all: Option<bool>) -> String {
        let display_all = display_all.unwrap_or(self.len <= MAX_SEGMENT_STRING);
        let offset = if humanize_addresses { 1 } else { 0 };

        let html_header = format!(
            "\n            <html><head><style type=\"text/css\">\n                table {{\n                    border-width: 1px;\n                    border-style: solid;\n                    border-color: gray;\n                    background-color: white;\n                    width: 100%;\n                }}\n                td {{\n                    border-width: 0px;\n                    padding: 3px;\n                    text-align: left;\n                }}\n                td.h {{\n                    font-weight: bold;\n                    background-color: lightgray;\n                    font-size: 120%;\n                }}\n                td.k {{\n                    background-color: #e6e6e6;\n                    white-space: pre;\n                }}\n                td.v {{\n                    background-color: #f2f2f2;\n                    font-style: italic;\n                    width: 100%;\n                }}\n            </style></head><body><a name=\"top\"/>\n        <h2>{}<br/></h2>",
            self.label
        );

        let render = |index: usize| self.get(index).to_html_fragment(offset, index + 1);

        let mut out = html_header;
        if display_all {
            let rendered: Vec<String> = (0..self.len).map(render).collect();
            out.push_str(&rendered.join("<br/>"));
        } else {
            let head: Vec<String> = (0..self.len.min(NUM_SEGMENTS_SUMMARY)).map(render).collect();
            out.push_str(&head.join("<br/>"));
            out.push_str(&format!("<p><i>[{} segments not displayed...]</i></p>", self.len - 2 * NUM_SEGMENTS_SUMMARY));
            let tail: Vec<String> = (self.len.saturating_sub(NUM_SEGMENTS_SUMMARY)..self.len).map(render).collect();
            out.push_str(&tail.join("<br/>"));
        }
        out.push_str("</body></html>");
        out
    }
}

fn sort_key(seg: &Segment) -> (usize, usize, usize) {
    (seg.str_index, seg.start_or_zero(), seg.end_or_len())
}

pub struct SegmentationIter<'a> {
    segmentation: &'a Segmentation,
    next: usize,
}

impl<'a> Iterator for SegmentationIter<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.next >= self.segmentation.len() {
            return None;
        }
        let seg = self.segmentation.get(self.next);
        self.next += 1;
        Some(seg)
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = Segment;
    type IntoIter = SegmentationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get_roundtrip() {
        let str_index = store::append_string("hello world");
        let mut seg = Segmentation::new("words");
        seg.append(Segment::new(str_index, Some(0), Some(5)));
        seg.append(Segment::new(str_index, Some(6), Some(11)));
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.get(0).content(), "hello");
        assert_eq!(seg.get(1).content(), "world");
    }

    #[test]
    fn paging_spills_and_reloads_transparently() {
        let str_index = store::append_string("abcdefghijklmnopqrstuvwxyz");
        let mut seg = Segmentation::with_paging(
            "letters",
            PagingConfig {
                chunk_size: 4,
                cache_size: 1,
            },
        );
        for i in 0..26usize {
            seg.append(Segment::new(str_index, Some(i), Some(i + 1)));
        }
        assert_eq!(seg.len(), 26);
        // Force access to an early (likely spilled) page and a late one.
        assert_eq!(seg.get(0).content(), "a");
        assert_eq!(seg.get(25).content(), "z");
        assert_eq!(seg.get(13).content(), "n");
    }

    #[test]
    fn sorted_is_idempotent() {
        let str_index = store::append_string("banana");
        let mut seg = Segmentation::new("letters");
        for (s, e) in [(3, 4), (0, 1), (5, 6)] {
            seg.append(Segment::new(str_index, Some(s), Some(e)));
        }
        let once = seg.sorted();
        let twice = once.sorted();
        let once_contents: Vec<_> = once.iter().map(|s| s.content()).collect();
        let twice_contents: Vec<_> = twice.iter().map(|s| s.content()).collect();
        assert_eq!(once_contents, twice_contents);
        assert_eq!(once_contents, vec!["a", "n", "a"]);
    }

    #[test]
    fn is_non_overlapping_detects_overlap() {
        let str_index = store::append_string("abcdef");
        let mut seg = Segmentation::new("spans");
        seg.append(Segment::new(str_index, Some(0), Some(3)));
        seg.append(Segment::new(str_index, Some(2), Some(5)));
        assert!(!seg.is_non_overlapping());

        let mut seg2 = Segmentation::new("spans");
        seg2.append(Segment::new(str_index, Some(0), Some(3)));
        seg2.append(Segment::new(str_index, Some(3), Some(5)));
        assert!(seg2.is_non_overlapping());
    }
}
