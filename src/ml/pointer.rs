// ============================================================
// Layer 5 — Boundary Pointer Decoder
// ============================================================
// Produces the span-start and span-end logit distributions over
// passage positions in exactly two steps:
//
//   start — score the decoder state against every document
//           position (additive scorer: tanh projection then a
//           scalar head)
//   update — blend the document by softmax(start logits) into a
//           context vector and advance the state one gated
//           recurrent step
//   end   — score the advanced state with the SAME scorer weights
//
// Both steps share one scorer instance; the recurrent state
// update between them is the only thing that differs. Padding
// positions are forced to -inf before either softmax, so the
// logits returned here are already mask-aware.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

use crate::ml::encoder::{GruCell, GruCellConfig};
use crate::ml::mask::softmax_mask;

/// Raw (pre-softmax) start and end scores over passage positions,
/// padding already masked.
pub struct PointerLogits<B: Backend> {
    /// [B, P]
    pub start: Tensor<B, 2>,
    /// [B, P]
    pub end: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct PointerDecoder<B: Backend> {
    score_hidden: Linear<B>,
    score_out:    Linear<B>,
    state_cell:   GruCell<B>,
    dropout:      Dropout,
}

#[derive(Config, Debug)]
pub struct PointerDecoderConfig {
    /// Width of one document position (2 * encoder hidden)
    pub encoding_size: usize,
    /// Width of the scorer's tanh projection
    pub attention_size: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl PointerDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PointerDecoder<B> {
        PointerDecoder {
            score_hidden: LinearConfig::new(2 * self.encoding_size, self.attention_size)
                .with_bias(false)
                .init(device),
            score_out: LinearConfig::new(self.attention_size, 1)
                .with_bias(false)
                .init(device),
            state_cell: GruCellConfig::new(self.encoding_size, self.encoding_size).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

impl<B: Backend> PointerDecoder<B> {
    /// init: [B, 2h], doc: [B, P, 2h], mask: [B, P]
    pub fn forward(
        &self,
        init: Tensor<B, 2>,
        doc:  Tensor<B, 3>,
        mask: Tensor<B, 2, Bool>,
    ) -> PointerLogits<B> {
        let [b, p, width] = doc.dims();
        let scored = self.dropout.forward(doc.clone());

        let start = self.score(init.clone(), scored.clone(), mask.clone());

        // Context vector under the start distribution, then one
        // recurrent step to the end-pointing state.
        let attn = activation::softmax(start.clone(), 1)
            .unsqueeze_dim::<3>(2)
            .expand([b, p, width]);
        let context = (doc * attn).sum_dim(1).squeeze::<2>(1);
        let state = self.state_cell.step(self.dropout.forward(context), init);

        let end = self.score(state, scored, mask);
        PointerLogits { start, end }
    }

    /// Additive attention score of `state` against every document
    /// position: w · tanh(W [state ‖ D_i]), masked.
    fn score(
        &self,
        state: Tensor<B, 2>,
        doc:   Tensor<B, 3>,
        mask:  Tensor<B, 2, Bool>,
    ) -> Tensor<B, 2> {
        let [b, p, width] = doc.dims();

        let tiled = state.unsqueeze_dim::<3>(1).expand([b, p, width]);
        let features = Tensor::cat(vec![tiled, doc], 2);
        let scores = self
            .score_out
            .forward(self.score_hidden.forward(features).tanh())
            .squeeze::<2>(2);
        softmax_mask(scores, mask)
    }
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
    fn test_pointer_logits_shapes() {
        let pointer = PointerDecoderConfig::new(6, 4).init::<TB>(&device());
        let init = Tensor::<TB, 2>::ones([2, 6], &device());
        let doc = Tensor::<TB, 3>::ones([2, 5, 6], &device());
        let mask = Tensor::<TB, 2, Int>::ones([2, 5], &device()).not_equal_elem(0);

        let logits = pointer.forward(init, doc, mask);
        assert_eq!(logits.start.dims(), [2, 5]);
        assert_eq!(logits.end.dims(), [2, 5]);
    }

    #[test]
    fn test_pointer_masks_padding_positions() {
        let pointer = PointerDecoderConfig::new(4, 3).init::<TB>(&device());
        let init = Tensor::<TB, 2>::ones([1, 4], &device());
        let doc = Tensor::<TB, 3>::ones([1, 4, 4], &device());
        let mask = Tensor::<TB, 2, Int>::from_ints([[1, 1, 0, 0]], &device()).not_equal_elem(0);

        let logits = pointer.forward(init, doc, mask);
        let start: Vec<f32> = logits.start.into_data().iter::<f32>().collect();
        let end: Vec<f32> = logits.end.into_data().iter::<f32>().collect();

        for logits in [start, end] {
            assert!(logits[0] > -1e29 && logits[1] > -1e29);
            assert!(logits[2] <= -1e29 && logits[3] <= -1e29);
        }
    }

    #[test]
    fn test_pointer_start_and_end_differ_through_state_update() {
        // Same scorer weights, but the recurrent update between the
        // two steps changes the state, so with a non-uniform document
        // the two logit rows are not forced to coincide.
        let pointer = PointerDecoderConfig::new(3, 2).init::<TB>(&device());
        let init = Tensor::<TB, 2>::from_floats([[0.4, -0.2, 0.9]], &device());
        let doc = Tensor::<TB, 3>::from_floats(
            [[[1.0, 0.0, -1.0], [0.3, 2.0, 0.7], [-0.5, 0.1, 0.2]]],
            &device(),
        );
        let mask = Tensor::<TB, 2, Int>::ones([1, 3], &device()).not_equal_elem(0);

        let logits = pointer.forward(init, doc, mask);
        let start: Vec<f32> = logits.start.into_data().iter::<f32>().collect();
        let end: Vec<f32> = logits.end.into_data().iter::<f32>().collect();
        assert_ne!(start, end);
    }
}
