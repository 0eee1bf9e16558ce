use rand::seq::index::sample as sample_indices;
use rand::Rng;

use crate::segment::Segment;
use crate::segmentation::Segmentation;
use crate::util::iround;

use super::auto_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    Random,
    Systematic,
}

/// Draws `sample_size` segments out of `segmentation`, returning
/// (sampled, not-sampled). `Random` draws a uniform subset of indices;
/// `Systematic` takes every `step`-th segment starting from the first,
/// where `step = iround(len / sample_size)`.
///
/// Grounded on `Segmenter.py::sample`.
#[allow(clippy::too_many_arguments)]
pub fn sample(
    segmentation: &Segmentation,
    sample_size: usize,
    mode: SampleMode,
    label: impl Into<String>,
    copy_annotations: bool,
    auto_number_as: Option<&str>,
    rng: &mut impl Rng,
    progress_callback: Option<&dyn Fn()>,
) -> (Segmentation, Segmentation) {
    let label = label.into();
    let mut new_segmentation = Segmentation::new(label.clone());
    let mut neg_segmentation = Segmentation::new(format!("NEG_{label}"));

    let len = segmentation.len();
    let sampled: std::collections::HashSet<usize> = match mode {
        SampleMode::Random => {
            let size = sample_size.min(len);
            sample_indices(rng, len, size).iter().collect()
        }
        SampleMode::Systematic => {
            let step = if sample_size == 0 {
                len.max(1)
            } else {
                iround(len as f64 / sample_size as f64).max(1) as usize
            };
            (0..len).step_by(step).collect()
        }
    };

    for (index, segment) in segmentation.iter().enumerate() {
        let annotations = segment.deepcopy_annotations(copy_annotations, None);
        let new_segment = Segment::with_annotations(segment.str_index, segment.start, segment.end, annotations);

        if sampled.contains(&index) {
            new_segmentation.append(new_segment);
        } else {
            neg_segmentation.append(new_segment);
        }

        if let Some(cb) = progress_callback {
            cb();
        }
    }

    if let Some(key) = auto_number_as.filter(|k| !k.is_empty()) {
        auto_number(&mut new_segmentation, key);
        auto_number(&mut neg_segmentation, key);
    }

    (new_segmentation, neg_segmentation)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn systematic_sample_picks_even_steps() {
        let seg = words("a b c d e f g h");
        let mut rng = rand::rng();
        let (sampled, rest) = sample(&seg, 4, SampleMode::Systematic, "s", true, None, &mut rng, None);
        assert_eq!(sampled.len(), 4);
        assert_eq!(rest.len(), 4);
    }

    #[test]
    fn random_sample_has_requested_size_and_complement() {
        let seg = words("a b c d e f g h");
        let mut rng = rand::rng();
        let (sampled, rest) = sample(&seg, 3, SampleMode::Random, "s", true, None, &mut rng, None);
        assert_eq!(sampled.len(), 3);
        assert_eq!(rest.len(), 5);
    }
}
