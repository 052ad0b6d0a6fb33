// ============================================================
// Layer 4 — Reader Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ReaderSample>
// into tensor batches. All samples are already rectangular (the
// featurizer padded them), so batching is flatten-and-reshape:
//
//   ids:    [s1_t1 .. s1_tP, s2_t1 ..] → [N, P]
//   chars:  pre-flattened per sample   → [N, P, CL]
//
// The gold span labels are emitted as one-hot indicator rows over
// passage positions; the model reduces them back to indices for
// the loss, and the trainer argmaxes them for accuracy counting.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::featurizer::ReaderSample;

// ─── ReaderBatch ──────────────────────────────────────────────────────────────
/// A batch of reader samples ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct ReaderBatch<B: Backend> {
    /// Passage word ids — [N, P]
    pub passage_ids: Tensor<B, 2, Int>,

    /// Question word ids — [N, Q]
    pub question_ids: Tensor<B, 2, Int>,

    /// Passage char ids — [N, P, CL]
    pub passage_chars: Tensor<B, 3, Int>,

    /// Question char ids — [N, Q, CL]
    pub question_chars: Tensor<B, 3, Int>,

    /// One-hot gold start positions — [N, P]
    pub start_indicator: Tensor<B, 2>,

    /// One-hot gold end positions — [N, P]
    pub end_indicator: Tensor<B, 2>,

    /// Example ids, aligned with the batch rows
    pub ids: Vec<String>,
}

// ─── ReaderBatcher ────────────────────────────────────────────────────────────
/// Holds the target device so tensors land on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct ReaderBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ReaderBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ReaderSample, ReaderBatch<B>> for ReaderBatcher<B> {
    fn batch(&self, items: Vec<ReaderSample>) -> ReaderBatch<B> {
        let n = items.len();
        // All samples are pre-padded to the same widths
        let p  = items[0].passage_ids.len();
        let q  = items[0].question_ids.len();
        let cl = items[0].passage_chars.len() / p;

        let passage_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.passage_ids.iter().map(|&x| x as i32))
            .collect();
        let question_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.question_ids.iter().map(|&x| x as i32))
            .collect();
        let passage_chars_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.passage_chars.iter().map(|&x| x as i32))
            .collect();
        let question_chars_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.question_chars.iter().map(|&x| x as i32))
            .collect();

        // One-hot indicator rows over passage positions
        let mut start_flat = vec![0.0f32; n * p];
        let mut end_flat   = vec![0.0f32; n * p];
        for (row, sample) in items.iter().enumerate() {
            start_flat[row * p + sample.start] = 1.0;
            end_flat[row * p + sample.end]     = 1.0;
        }

        ReaderBatch {
            passage_ids: Tensor::<B, 1, Int>::from_ints(passage_flat.as_slice(), &self.device)
                .reshape([n, p]),
            question_ids: Tensor::<B, 1, Int>::from_ints(question_flat.as_slice(), &self.device)
                .reshape([n, q]),
            passage_chars: Tensor::<B, 1, Int>::from_ints(
                passage_chars_flat.as_slice(),
                &self.device,
            )
            .reshape([n, p, cl]),
            question_chars: Tensor::<B, 1, Int>::from_ints(
                question_chars_flat.as_slice(),
                &self.device,
            )
            .reshape([n, q, cl]),
            start_indicator: Tensor::<B, 1>::from_floats(start_flat.as_slice(), &self.device)
                .reshape([n, p]),
            end_indicator: Tensor::<B, 1>::from_floats(end_flat.as_slice(), &self.device)
                .reshape([n, p]),
            ids: items.into_iter().map(|s| s.id).collect(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TB = burn::backend::NdArray;

    fn sample(id: &str, start: usize, end: usize) -> ReaderSample {
        ReaderSample {
            id:             id.to_string(),
            passage_ids:    vec![3, 7, 2, 9, 0],
            question_ids:   vec![5, 6],
            passage_chars:  vec![1, 2, 0, 3, 0, 0, 2, 2, 2, 4, 5, 0, 0, 0, 0],
            question_chars: vec![1, 0, 0, 6, 2, 0],
            start,
            end,
        }
    }

    #[test]
    fn test_batch_tensor_shapes() {
        let batcher = ReaderBatcher::<TB>::new(NdArrayDevice::Default);
        let batch = batcher.batch(vec![sample("a", 1, 2), sample("b", 0, 0)]);

        assert_eq!(batch.passage_ids.dims(), [2, 5]);
        assert_eq!(batch.question_ids.dims(), [2, 2]);
        assert_eq!(batch.passage_chars.dims(), [2, 5, 3]);
        assert_eq!(batch.question_chars.dims(), [2, 2, 3]);
        assert_eq!(batch.start_indicator.dims(), [2, 5]);
        assert_eq!(batch.ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_indicators_are_one_hot_at_gold_positions() {
        let batcher = ReaderBatcher::<TB>::new(NdArrayDevice::Default);
        let batch = batcher.batch(vec![sample("a", 1, 2)]);

        let start: Vec<f32> = batch.start_indicator.into_data().iter::<f32>().collect();
        let end: Vec<f32> = batch.end_indicator.into_data().iter::<f32>().collect();
        assert_eq!(start, vec![0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(end, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_row_order_is_preserved() {
        let batcher = ReaderBatcher::<TB>::new(NdArrayDevice::Default);
        let batch = batcher.batch(vec![sample("first", 0, 1), sample("second", 2, 3)]);

        let ids: Vec<i64> = batch.passage_ids.into_data().iter::<i64>().collect();
        assert_eq!(&ids[..5], &[3, 7, 2, 9, 0]);
        assert_eq!(batch.ids[1], "second");
    }
}
