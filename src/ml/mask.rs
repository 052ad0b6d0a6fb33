// ============================================================
// Layer 5 — Masking and Length Utilities
// ============================================================
// Everything downstream of the batcher works on rectangular,
// zero-padded id tensors. This module derives the three views
// the model needs from them:
//
//   padding_mask — Bool per position, true where id != 0
//   seq_lengths  — count of true positions per row
//   char_lengths — per-token character count, flattened to
//                  [batch * seq_len] because the char encoder
//                  processes every token of the batch at once
//
// plus the masked-softmax helper and the batch-wise length
// trimming used in optimized mode.
//
// All functions are pure derivations; an all-padding row yields
// length 0 and must flow through the encoders without panicking.

use burn::prelude::*;

/// Large negative bias added to invalid logits. exp(-1e30) underflows
/// to exactly 0.0 in f32, so masked positions get zero probability
/// mass; a fully masked row comes out uniform rather than NaN.
const MASK_FILL: f32 = -1e30;

/// Bool mask over a padded id tensor: true where id != 0.
pub fn padding_mask<B: Backend>(ids: Tensor<B, 2, Int>) -> Tensor<B, 2, Bool> {
    ids.not_equal_elem(0)
}

/// True sequence length per row: the number of unmasked positions.
pub fn seq_lengths<B: Backend>(mask: Tensor<B, 2, Bool>) -> Tensor<B, 1, Int> {
    mask.int().sum_dim(1).squeeze::<1>(1)
}

/// Character count per token, flattened across batch and sequence
/// position. chars: [B, L, CL] → lengths: [B * L].
pub fn char_lengths<B: Backend>(chars: Tensor<B, 3, Int>) -> Tensor<B, 1, Int> {
    let [b, l, _cl] = chars.dims();
    chars
        .not_equal_elem(0)
        .int()
        .sum_dim(2)
        .reshape([b * l])
}

/// Replace logits at masked-out positions with a large negative
/// constant so a following softmax assigns them zero probability.
pub fn softmax_mask<B: Backend, const D: usize>(
    logits: Tensor<B, D>,
    mask:   Tensor<B, D, Bool>,
) -> Tensor<B, D> {
    logits.mask_fill(mask.bool_not(), MASK_FILL)
}

/// The working sequence length for one batch: in optimized mode the
/// longest true length actually present (so padding columns beyond it
/// are never computed on), otherwise the full padded width. Clamped
/// to at least 1 so a fully padded batch still produces tensors.
pub fn working_length<B: Backend>(
    lengths:  &Tensor<B, 1, Int>,
    padded:   usize,
    optimize: bool,
) -> usize {
    if !optimize {
        return padded;
    }
    let longest = lengths.clone().max().into_scalar().elem::<i64>() as usize;
    longest.clamp(1, padded)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TB = burn::backend::NdArray;

    fn device() -> NdArrayDevice {
        NdArrayDevice::Default
    }

    #[test]
    fn test_padding_mask_and_lengths() {
        let ids = Tensor::<TB, 2, Int>::from_ints([[3, 7, 2, 9, 0], [5, 6, 0, 0, 0]], &device());
        let mask = padding_mask(ids);

        let rows: Vec<bool> = mask.clone().into_data().iter::<bool>().collect();
        assert_eq!(rows, vec![true, true, true, true, false, true, true, false, false, false]);

        let lengths: Vec<i64> = seq_lengths(mask).into_data().iter::<i64>().collect();
        assert_eq!(lengths, vec![4, 2]);
    }

    #[test]
    fn test_all_padding_row_has_length_zero() {
        let ids = Tensor::<TB, 2, Int>::from_ints([[0, 0, 0]], &device());
        let lengths: Vec<i64> = seq_lengths(padding_mask(ids)).into_data().iter::<i64>().collect();
        assert_eq!(lengths, vec![0]);
    }

    #[test]
    fn test_char_lengths_flatten_batch_and_position() {
        // 1 example, 2 tokens, 3 chars each: "ab_" and "___"
        let chars = Tensor::<TB, 3, Int>::from_ints([[[4, 2, 0], [0, 0, 0]]], &device());
        let lengths: Vec<i64> = char_lengths(chars).into_data().iter::<i64>().collect();
        assert_eq!(lengths, vec![2, 0]);
    }

    #[test]
    fn test_softmax_mask_single_valid_entry_gets_full_mass() {
        let logits = Tensor::<TB, 2>::from_floats([[0.3, 1.2, -0.5]], &device());
        let mask = Tensor::<TB, 2, Int>::from_ints([[0, 1, 0]], &device()).not_equal_elem(0);
        let probs = burn::tensor::activation::softmax(softmax_mask(logits, mask), 1);
        let probs: Vec<f32> = probs.into_data().iter::<f32>().collect();
        assert_eq!(probs[1], 1.0);
        assert_eq!(probs[0], 0.0);
        assert_eq!(probs[2], 0.0);
    }

    #[test]
    fn test_softmax_mask_fully_masked_row_is_uniform_not_nan() {
        let logits = Tensor::<TB, 2>::from_floats([[0.5, -0.7]], &device());
        let mask = Tensor::<TB, 2, Int>::from_ints([[0, 0]], &device()).not_equal_elem(0);
        let probs = burn::tensor::activation::softmax(softmax_mask(logits, mask), 1);
        let probs: Vec<f32> = probs.into_data().iter::<f32>().collect();
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_working_length_trims_to_longest_row() {
        let ids = Tensor::<TB, 2, Int>::from_ints([[3, 7, 2, 9, 0], [5, 0, 0, 0, 0]], &device());
        let lengths = seq_lengths(padding_mask(ids));
        assert_eq!(working_length(&lengths, 5, true), 4);
        assert_eq!(working_length(&lengths, 5, false), 5);
    }

    #[test]
    fn test_working_length_of_empty_batch_is_clamped_to_one() {
        let ids = Tensor::<TB, 2, Int>::from_ints([[0, 0, 0, 0]], &device());
        let lengths = seq_lengths(padding_mask(ids));
        assert_eq!(working_length(&lengths, 4, true), 1);
    }
}
