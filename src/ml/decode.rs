// ============================================================
// Layer 5 — Banded Span Decoding
// ============================================================
// Turns the start/end logit rows into one answer span per
// example. The joint probability of every (start, end) pair is
// the outer product of the two softmaxed rows; everything outside
// the band 0 <= end - start <= max_span_len is zeroed before the
// argmaxes, so end >= start and the span-length cap hold by
// construction — there is no post-hoc validation step.
//
// Ties resolve to the first-occurring index (plain argmax).

use burn::{prelude::*, tensor::activation};

use crate::domain::span::AnswerSpan;

/// Decoded spans for one batch, in row order, with the joint
/// probability mass the decoder put on each chosen span.
pub struct DecodedSpans {
    pub spans:  Vec<AnswerSpan>,
    pub scores: Vec<f32>,
}

/// start_logits, end_logits: [B, P] (padding already masked).
pub fn decode_spans<B: Backend>(
    start_logits: Tensor<B, 2>,
    end_logits:   Tensor<B, 2>,
    max_span_len: usize,
) -> DecodedSpans {
    let [b, p] = start_logits.dims();
    let device = start_logits.device();

    // Joint probability matrix [B, P, P]
    let joint = activation::softmax(start_logits, 1)
        .unsqueeze_dim::<3>(2)
        .matmul(activation::softmax(end_logits, 1).unsqueeze_dim::<3>(1));

    // Band keeping only 0 <= col - row <= max_span_len
    let rows = Tensor::<B, 1, Int>::arange(0..p as i64, &device)
        .reshape([p, 1])
        .expand([p, p]);
    let cols = Tensor::<B, 1, Int>::arange(0..p as i64, &device)
        .reshape([1, p])
        .expand([p, p]);
    let band = cols.clone().greater_equal(rows.clone()).float()
        * cols
            .lower_equal(rows.add_scalar(max_span_len as i64))
            .float();
    let banded = joint * band.unsqueeze::<3>().expand([b, p, p]);

    // Row-wise max → best start; column-wise max → best end
    let starts = banded.clone().max_dim(2).squeeze::<2>(2).argmax(1);
    let ends   = banded.clone().max_dim(1).squeeze::<2>(1).argmax(1);
    let best   = banded.reshape([b, p * p]).max_dim(1).squeeze::<1>(1);

    let starts: Vec<i64> = starts.into_data().iter::<i64>().collect();
    let ends:   Vec<i64> = ends.into_data().iter::<i64>().collect();
    let scores: Vec<f32> = best.into_data().iter::<f32>().collect();

    let spans = starts
        .iter()
        .zip(ends.iter())
        .map(|(&s, &e)| AnswerSpan::new(s as usize, e as usize))
        .collect();

    DecodedSpans { spans, scores }
}
