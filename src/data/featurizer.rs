// ============================================================
// Layer 4 — Featurizer
// ============================================================
// Turns ragged ReaderExamples into rectangular ReaderSamples:
// passage ids padded/truncated to para_limit, question ids to
// ques_limit, and each token's character ids to char_limit. Char
// grids are stored row-major and pre-flattened so the batcher
// only concatenates.
//
// An example whose answer span would be cut off by passage
// truncation is dropped (and counted), not clamped — a clamped
// label would teach the model wrong boundaries.

use serde::{Deserialize, Serialize};

use crate::domain::example::ReaderExample;

/// One rectangular training/inference sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSample {
    pub id: String,

    /// Passage word ids, length = para_limit
    pub passage_ids: Vec<u32>,

    /// Question word ids, length = ques_limit
    pub question_ids: Vec<u32>,

    /// Passage char ids, length = para_limit * char_limit, row-major
    pub passage_chars: Vec<u32>,

    /// Question char ids, length = ques_limit * char_limit
    pub question_chars: Vec<u32>,

    /// Gold span start (passage token index)
    pub start: usize,

    /// Gold span end, inclusive
    pub end: usize,
}

pub struct Featurizer {
    para_limit: usize,
    ques_limit: usize,
    char_limit: usize,
}

impl Featurizer {
    pub fn new(para_limit: usize, ques_limit: usize, char_limit: usize) -> Self {
        Self { para_limit, ques_limit, char_limit }
    }

    /// Featurise one example, or None when its span does not survive
    /// passage truncation.
    pub fn featurize(&self, ex: &ReaderExample) -> Option<ReaderSample> {
        if !ex.span_is_valid() || ex.answer_end >= self.para_limit {
            return None;
        }

        Some(ReaderSample {
            id:             ex.id.clone(),
            passage_ids:    pad_ids(&ex.passage_ids, self.para_limit),
            question_ids:   pad_ids(&ex.question_ids, self.ques_limit),
            passage_chars:  pad_chars(&ex.passage_chars, self.para_limit, self.char_limit),
            question_chars: pad_chars(&ex.question_chars, self.ques_limit, self.char_limit),
            start:          ex.answer_start,
            end:            ex.answer_end,
        })
    }

    /// Featurise for inference, where every input row must produce a
    /// sample: an unusable gold span degrades to (0, 0) instead of
    /// dropping the example.
    pub fn featurize_for_inference(&self, ex: &ReaderExample) -> ReaderSample {
        self.featurize(ex).unwrap_or_else(|| ReaderSample {
            id:             ex.id.clone(),
            passage_ids:    pad_ids(&ex.passage_ids, self.para_limit),
            question_ids:   pad_ids(&ex.question_ids, self.ques_limit),
            passage_chars:  pad_chars(&ex.passage_chars, self.para_limit, self.char_limit),
            question_chars: pad_chars(&ex.question_chars, self.ques_limit, self.char_limit),
            start:          0,
            end:            0,
        })
    }

    /// Featurise a whole set, logging how many examples were dropped.
    pub fn featurize_all(&self, examples: &[ReaderExample]) -> Vec<ReaderSample> {
        let samples: Vec<ReaderSample> =
            examples.iter().filter_map(|ex| self.featurize(ex)).collect();

        let dropped = examples.len() - samples.len();
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} of {} examples (invalid span or span beyond the passage limit)",
                dropped,
                examples.len()
            );
        }
        samples
    }
}

fn pad_ids(ids: &[u32], limit: usize) -> Vec<u32> {
    let mut out: Vec<u32> = ids.iter().take(limit).copied().collect();
    out.resize(limit, 0);
    out
}

fn pad_chars(rows: &[Vec<u32>], limit: usize, char_limit: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(limit * char_limit);
    for index in 0..limit {
        match rows.get(index) {
            Some(row) => {
                out.extend(row.iter().take(char_limit).copied());
                out.resize((index + 1) * char_limit, 0);
            }
            None => out.resize((index + 1) * char_limit, 0),
        }
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> ReaderExample {
        ReaderExample {
            id:             "ex-1".to_string(),
            passage_ids:    vec![3, 7, 2, 9],
            question_ids:   vec![5, 6],
            passage_chars:  vec![vec![1, 2], vec![3], vec![2, 2, 2, 2], vec![4, 5]],
            question_chars: vec![vec![1], vec![6, 2]],
            answer_start:   1,
            answer_end:     2,
        }
    }

    #[test]
    fn test_pads_ids_to_limits() {
        let sample = Featurizer::new(6, 3, 3).featurize(&example()).unwrap();
        assert_eq!(sample.passage_ids, vec![3, 7, 2, 9, 0, 0]);
        assert_eq!(sample.question_ids, vec![5, 6, 0]);
    }

    #[test]
    fn test_char_grid_is_row_major_padded_and_truncated() {
        let sample = Featurizer::new(5, 2, 3).featurize(&example()).unwrap();
        assert_eq!(sample.passage_chars.len(), 5 * 3);
        // token 0: "1 2 _", token 1: "3 _ _", token 2 truncated to 3 chars
        assert_eq!(&sample.passage_chars[..9], &[1, 2, 0, 3, 0, 0, 2, 2, 2]);
        // padding tokens are all-zero rows
        assert_eq!(&sample.passage_chars[12..], &[0, 0, 0]);
    }

    #[test]
    fn test_span_outside_truncated_passage_is_dropped() {
        // para_limit 2 cuts the passage below answer_end == 2
        assert!(Featurizer::new(2, 3, 3).featurize(&example()).is_none());
    }

    #[test]
    fn test_inverted_span_is_dropped() {
        let mut ex = example();
        ex.answer_start = 3;
        ex.answer_end = 1;
        assert!(Featurizer::new(6, 3, 3).featurize(&ex).is_none());
    }

    #[test]
    fn test_inference_featurisation_never_drops() {
        let mut ex = example();
        ex.answer_end = 9; // beyond the passage — unusable as a label
        let sample = Featurizer::new(3, 3, 3).featurize_for_inference(&ex);
        assert_eq!((sample.start, sample.end), (0, 0));
        assert_eq!(sample.passage_ids, vec![3, 7, 2]);
    }

    #[test]
    fn test_featurize_all_keeps_only_survivors() {
        let mut cut = example();
        cut.answer_end = 3;
        let samples = Featurizer::new(3, 3, 3).featurize_all(&[example(), cut]);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].end, 2);
    }
}
