// ============================================================
// Layer 3 — ReaderExample Domain Type
// ============================================================
// One labelled reading-comprehension example, already tokenised:
// the passage and question are integer word ids, and every token
// additionally carries its character ids so the model can build
// character-level features for rare words.
//
// Id conventions (shared with the embedding matrices):
//   0 — padding (row 0 of each matrix is all-zero)
//   1 — out-of-vocabulary placeholder
//
// The answer is a SPAN within the passage: an inclusive
// (answer_start, answer_end) pair of token indices. The model
// never generates text — it points at where the answer already
// sits in the passage.

use serde::{Deserialize, Serialize};

/// A labelled example with token-level span annotation.
///
/// `answer_start`/`answer_end` index into `passage_ids`
/// (inclusive on both sides), never into the raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderExample {
    /// Stable identifier used to key predictions
    pub id: String,

    /// Passage word ids, unpadded
    pub passage_ids: Vec<u32>,

    /// Question word ids, unpadded
    pub question_ids: Vec<u32>,

    /// Character ids per passage token (ragged)
    pub passage_chars: Vec<Vec<u32>>,

    /// Character ids per question token (ragged)
    pub question_chars: Vec<Vec<u32>>,

    /// Index of the FIRST answer token in the passage
    pub answer_start: usize,

    /// Index of the LAST answer token in the passage (inclusive)
    pub answer_end: usize,
}

impl ReaderExample {
    /// Returns the length of the answer span in tokens
    pub fn span_length(&self) -> usize {
        self.answer_end.saturating_sub(self.answer_start) + 1
    }

    /// True when the span indices are ordered and inside the passage
    pub fn span_is_valid(&self) -> bool {
        self.answer_start <= self.answer_end && self.answer_end < self.passage_ids.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn example(start: usize, end: usize, passage_len: usize) -> ReaderExample {
        ReaderExample {
            id:             "ex-1".to_string(),
            passage_ids:    vec![2; passage_len],
            question_ids:   vec![3, 4],
            passage_chars:  vec![vec![5]; passage_len],
            question_chars: vec![vec![5]; 2],
            answer_start:   start,
            answer_end:     end,
        }
    }

    #[test]
    fn test_span_length_is_inclusive() {
        assert_eq!(example(1, 3, 6).span_length(), 3);
        assert_eq!(example(2, 2, 6).span_length(), 1);
    }

    #[test]
    fn test_span_validity() {
        assert!(example(1, 3, 6).span_is_valid());
        assert!(!example(3, 1, 6).span_is_valid());
        assert!(!example(1, 6, 6).span_is_valid());
    }
}
