use crate::segment::Segment;
use crate::segmentation::Segmentation;

/// Returns a verbatim copy of `segmentation` under a new label, with
/// every segment and its annotations deep-copied.
///
/// Grounded on `Segmenter.py::bypass`.
pub fn bypass(segmentation: &Segmentation, label: impl Into<String>) -> Segmentation {
    let mut copy = Segmentation::new(label);
    for segment in segmentation.iter() {
        copy.append(Segment::with_annotations(
            segment.str_index,
            segment.start,
            segment.end,
            segment.annotations.clone(),
        ));
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    #[test]
    fn produces_an_identical_independent_copy() {
        let str_index = store::append_string("hello world".to_string());
        let mut seg = Segmentation::new("original");
        seg.append(Segment::new(str_index, Some(0), Some(5)));
        seg.append(Segment::new(str_index, Some(6), Some(11)));

        let copy = bypass(&seg, "copied");
        assert_eq!(copy.label(), "copied");
        assert_eq!(copy.len(), seg.len());
        assert_eq!(copy.get(0).content(), "hello");
        assert_eq!(copy.get(1).content(), "world");
    }
}
