// ============================================================
// Layer 5 — Bidirectional Attention Flow
// ============================================================
// Fuses the encoded passage and question into one
// attention-aware passage representation, in both directions:
//
//   context-to-query — every passage position attends over the
//                      question positions
//   query-to-context — the passage is re-weighted by its single
//                      most question-relevant position
//
// The similarity matrix is a learned linear projection of
// [C_i ‖ Q_j ‖ C_i ⊙ Q_j] for every position pair; its softmaxes
// are deliberately unnormalised by any padding mask — optimized
// length trimming keeps stray padding columns rare, and the
// downstream pointer logits are masked.
//
// Also hosts the bilinear summarization that turns the question
// into a single vector attended against the passage, used to
// seed the pointer decoder's state.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

use crate::ml::mask::softmax_mask;

// ─── AttentionFlow ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct AttentionFlow<B: Backend> {
    /// Projects the 6h pairwise feature to one similarity score
    similarity: Linear<B>,
}

#[derive(Config, Debug)]
pub struct AttentionFlowConfig {
    /// Width of one encoded position (2 * encoder hidden)
    pub encoding_size: usize,
}

impl AttentionFlowConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionFlow<B> {
        AttentionFlow {
            similarity: LinearConfig::new(3 * self.encoding_size, 1)
                .with_bias(false)
                .init(device),
        }
    }
}

impl<B: Backend> AttentionFlow<B> {
    /// c: [B, P, 2h], q: [B, Q, 2h] → fused [B, P, 8h]
    pub fn forward(&self, c: Tensor<B, 3>, q: Tensor<B, 3>) -> Tensor<B, 3> {
        let [b, p, width] = c.dims();
        let qn = q.dims()[1];

        // Pairwise features [C_i, Q_j, C_i ⊙ Q_j] → [B, P, Q, 6h]
        let c_exp = c.clone().unsqueeze_dim::<4>(2).expand([b, p, qn, width]);
        let q_exp = q.clone().unsqueeze_dim::<4>(1).expand([b, p, qn, width]);
        let pairwise = Tensor::cat(
            vec![c_exp.clone(), q_exp.clone(), c_exp * q_exp],
            3,
        );

        // Similarity matrix S: [B, P, Q]
        let s = self.similarity.forward(pairwise).squeeze::<3>(3);

        // Context-to-query: blend of question positions per passage position
        let c2q = activation::softmax(s.clone(), 2).matmul(q);

        // Query-to-context: one global passage blend, tiled to all positions
        let s_max = s.max_dim(2).squeeze::<2>(2);
        let q2c = activation::softmax(s_max, 1)
            .unsqueeze_dim::<3>(1)
            .matmul(c.clone())
            .expand([b, p, width]);

        Tensor::cat(
            vec![c.clone(), c2q.clone(), c.clone() * c2q, c * q2c],
            2,
        )
    }
}

// ─── BilinearAttention ────────────────────────────────────────────────────────
/// Scores every passage position against a single query vector
/// through a learned square bilinear form, then returns the
/// attention-weighted passage blend.
#[derive(Module, Debug)]
pub struct BilinearAttention<B: Backend> {
    bilinear: Linear<B>,
}

#[derive(Config, Debug)]
pub struct BilinearAttentionConfig {
    /// Width of one encoded position (2 * encoder hidden)
    pub encoding_size: usize,
}

impl BilinearAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BilinearAttention<B> {
        BilinearAttention {
            bilinear: LinearConfig::new(self.encoding_size, self.encoding_size)
                .with_bias(false)
                .init(device),
        }
    }
}

impl<B: Backend> BilinearAttention<B> {
    /// doc: [B, P, 2h], query: [B, 2h], mask: [B, P] → [B, 2h]
    pub fn forward(
        &self,
        doc:   Tensor<B, 3>,
        query: Tensor<B, 2>,
        mask:  Tensor<B, 2, Bool>,
    ) -> Tensor<B, 2> {
        let [b, p, width] = doc.dims();

        let m = self
            .bilinear
            .forward(query)
            .unsqueeze_dim::<3>(1)
            .expand([b, p, width]);
        let scores = (doc.clone() * m).sum_dim(2).squeeze::<2>(2);

        let alpha = activation::softmax(softmax_mask(scores, mask), 1)
            .unsqueeze_dim::<3>(2)
            .expand([b, p, width]);
        (doc * alpha).sum_dim(1).squeeze::<2>(1)
    }
}
