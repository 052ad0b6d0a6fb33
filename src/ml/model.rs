// ============================================================
// Layer 5 — The Attention-Flow Reader Model
// ============================================================
// Assembles the full forward graph:
//
//   padded ids ──► masks / true lengths (+ optional batch trim)
//        │
//        ▼
//   word lookup ‖ char-encoder summary        (embedding fusion)
//        │
//        ▼
//   shared bidirectional context encoder      (passage AND question)
//        │
//        ▼
//   bidirectional attention flow → [B, P, 8h]
//        │
//        ▼
//   fresh fusion encoder → document encoding [B, P, 2h]
//        │
//        ▼
//   bilinear question summary seeds the two-step pointer decoder
//        │
//        ▼
//   start / end logits over passage positions (padding masked)
//
// Parameter ownership is explicit: the context encoder is ONE
// instance applied to both passage and question (deliberate weight
// sharing), the fusion encoder is a SEPARATE instance, and the
// word table is a plain constant tensor so no gradient ever
// reaches it, while the char table is a trainable Param.

use anyhow::{ensure, Result};
use burn::{
    module::Param,
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig},
    prelude::*,
    tensor::TensorData,
};

use crate::ml::attention::{
    AttentionFlow, AttentionFlowConfig, BilinearAttention, BilinearAttentionConfig,
};
use crate::ml::decode::{decode_spans, DecodedSpans};
use crate::ml::encoder::{
    EncoderKind, NativeGruEncoder, NativeGruEncoderConfig, SequenceEncode, SequenceEncoder,
    SequenceEncoderConfig,
};
use crate::ml::mask::{char_lengths, padding_mask, seq_lengths, working_length};
use crate::ml::pointer::{PointerDecoder, PointerDecoderConfig};

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BidafConfig {
    /// Width of one pretrained word vector
    pub word_dim: usize,
    /// Width of one character vector
    pub char_dim: usize,
    /// Recurrent width of the context/fusion encoders
    pub hidden: usize,
    /// Recurrent width of the character encoder
    pub char_hidden: usize,
    /// Dropout retention probability (1.0 disables dropout)
    #[config(default = 0.7)]
    pub keep_prob: f64,
    /// Widest span the decoder may emit (end - start)
    #[config(default = 15)]
    pub max_span_len: usize,
    /// Static passage width the batcher pads to
    #[config(default = 400)]
    pub para_limit: usize,
    /// Static question width the batcher pads to
    #[config(default = 50)]
    pub ques_limit: usize,
    /// Characters kept per token
    #[config(default = 16)]
    pub char_limit: usize,
    /// Which sequence-encoder variant the call sites construct
    #[config(default = "EncoderKind::Native")]
    pub encoder: EncoderKind,
    /// Trim each batch to its longest true length before encoding
    #[config(default = true)]
    pub optimize_lengths: bool,
}

impl BidafConfig {
    /// Build the model, taking ownership of the pretrained tables.
    /// The word table stays frozen; the char table trains.
    ///
    /// Every dimension the matrices must agree on is validated here —
    /// a mismatch is unrecoverable and reported with the offending
    /// sizes rather than surfacing later as a shape panic mid-batch.
    pub fn init<B: Backend>(
        &self,
        word_matrix: &[Vec<f32>],
        char_matrix: &[Vec<f32>],
        device: &B::Device,
    ) -> Result<BidafModel<B>> {
        ensure!(
            self.hidden > 0 && self.char_hidden > 0,
            "Encoder widths must be positive (hidden={}, char_hidden={})",
            self.hidden,
            self.char_hidden
        );
        ensure!(
            (0.0..=1.0).contains(&self.keep_prob),
            "keep_prob must lie in [0, 1], got {}",
            self.keep_prob
        );

        let word_table = table_from_rows::<B>(word_matrix, self.word_dim, "word", device)?;
        let char_table = table_from_rows::<B>(char_matrix, self.char_dim, "char", device)?;
        let drop = 1.0 - self.keep_prob;
        let token_dim = self.word_dim + 2 * self.char_hidden;

        Ok(BidafModel {
            word_table,
            char_table:   Param::from_tensor(char_table),
            char_dropout: DropoutConfig::new(drop).init(),
            char_encoder: NativeGruEncoderConfig::new(self.char_dim, self.char_hidden)
                .init(device),
            context_encoder: SequenceEncoderConfig::new(token_dim, self.hidden, self.encoder.clone())
                .with_dropout(drop)
                .init(device),
            fusion_encoder: SequenceEncoderConfig::new(8 * self.hidden, self.hidden, self.encoder.clone())
                .with_dropout(drop)
                .init(device),
            attention:  AttentionFlowConfig::new(2 * self.hidden).init(device),
            summarizer: BilinearAttentionConfig::new(2 * self.hidden).init(device),
            pointer: PointerDecoderConfig::new(2 * self.hidden, self.hidden)
                .with_dropout(drop)
                .init(device),
            para_limit:       self.para_limit,
            ques_limit:       self.ques_limit,
            max_span_len:     self.max_span_len,
            optimize_lengths: self.optimize_lengths,
        })
    }
}

fn table_from_rows<B: Backend>(
    rows:   &[Vec<f32>],
    dim:    usize,
    name:   &str,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    ensure!(!rows.is_empty(), "The {name} embedding matrix is empty");
    for (index, row) in rows.iter().enumerate() {
        ensure!(
            row.len() == dim,
            "Dimension mismatch in the {name} embedding matrix: \
             row {index} has width {}, configured {name}_dim is {dim}",
            row.len()
        );
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_data(
        TensorData::new(flat, [rows.len(), dim]),
        device,
    ))
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BidafModel<B: Backend> {
    /// Pretrained word vectors — constant, never updated
    word_table: Tensor<B, 2>,
    /// Character vectors — trainable
    char_table:       Param<Tensor<B, 2>>,
    char_dropout:     Dropout,
    char_encoder:     NativeGruEncoder<B>,
    context_encoder:  SequenceEncoder<B>,
    fusion_encoder:   SequenceEncoder<B>,
    attention:        AttentionFlow<B>,
    summarizer:       BilinearAttention<B>,
    pointer:          PointerDecoder<B>,
    para_limit:       usize,
    ques_limit:       usize,
    max_span_len:     usize,
    optimize_lengths: bool,
}

/// One batch of padded id tensors, as produced by the batcher.
#[derive(Debug, Clone)]
pub struct ReaderInput<B: Backend> {
    /// [B, P]
    pub passage_ids: Tensor<B, 2, Int>,
    /// [B, Q]
    pub question_ids: Tensor<B, 2, Int>,
    /// [B, P, CL]
    pub passage_chars: Tensor<B, 3, Int>,
    /// [B, Q, CL]
    pub question_chars: Tensor<B, 3, Int>,
}

/// Raw span logits over the working passage width, padding masked.
pub struct ReaderOutput<B: Backend> {
    /// [B, P_work]
    pub start_logits: Tensor<B, 2>,
    /// [B, P_work]
    pub end_logits: Tensor<B, 2>,
    /// [B, P_work]
    pub passage_mask: Tensor<B, 2, Bool>,
    /// The passage width actually computed on this batch
    pub working_len: usize,
}

impl<B: Backend> BidafModel<B> {
    /// Full forward pass: ids in, masked start/end logits out.
    pub fn forward(&self, input: ReaderInput<B>) -> ReaderOutput<B> {
        let (b, p_full, q_full, cl) = self.check_shapes(&input);

        // True lengths over the full padded width
        let c_len = seq_lengths(padding_mask(input.passage_ids.clone()));
        let q_len = seq_lengths(padding_mask(input.question_ids.clone()));

        // Working widths: longest true length in optimized mode,
        // the static limits otherwise
        let p_work = working_length(&c_len, p_full, self.optimize_lengths);
        let q_work = working_length(&q_len, q_full, self.optimize_lengths);

        let c_ids   = input.passage_ids.slice([0..b, 0..p_work]);
        let q_ids   = input.question_ids.slice([0..b, 0..q_work]);
        let c_chars = input.passage_chars.slice([0..b, 0..p_work, 0..cl]);
        let q_chars = input.question_chars.slice([0..b, 0..q_work, 0..cl]);
        let c_mask  = padding_mask(c_ids.clone());

        // Embedding fusion
        let c_emb = self.embed_tokens(c_ids, c_chars);
        let q_emb = self.embed_tokens(q_ids, q_chars);

        // One shared contextual encoder for passage and question
        let c_enc = self.context_encoder.encode(c_emb, c_len.clone()).outputs;
        let q_enc = self.context_encoder.encode(q_emb, q_len.clone()).outputs;

        // Compact question summary: its last valid encoded position
        let width = c_enc.dims()[2];
        let q_idx = q_len
            .sub_scalar(1)
            .clamp_min(0)
            .reshape([b, 1, 1])
            .expand([b, 1, width]);
        let q_state = q_enc.clone().gather(1, q_idx).squeeze::<2>(1);

        // Attention flow, then a fresh encoder over the fused tensor
        let fused = self.attention.forward(c_enc.clone(), q_enc);
        let doc = self.fusion_encoder.encode(fused, c_len).outputs;

        // Bilinear summary seeds the pointer decoder
        let init = self.summarizer.forward(c_enc, q_state, c_mask.clone());
        let logits = self.pointer.forward(init, doc, c_mask.clone());

        ReaderOutput {
            start_logits: logits.start,
            end_logits:   logits.end,
            passage_mask: c_mask,
            working_len:  p_work,
        }
    }

    /// Training objective: summed start/end softmax cross-entropy,
    /// averaged over the batch. The gold indicators are reduced to
    /// their class index first, so only the correct-class
    /// log-probability enters the loss and no gradient can reach
    /// the labels.
    pub fn forward_loss(
        &self,
        input:           ReaderInput<B>,
        start_indicator: Tensor<B, 2>,
        end_indicator:   Tensor<B, 2>,
    ) -> (Tensor<B, 1>, ReaderOutput<B>) {
        let [b, p_full] = input.passage_ids.dims();
        assert_eq!(
            start_indicator.dims(),
            [b, p_full],
            "Start indicator shape {:?} does not match passage ids [{b}, {p_full}]",
            start_indicator.dims()
        );
        assert_eq!(
            end_indicator.dims(),
            [b, p_full],
            "End indicator shape {:?} does not match passage ids [{b}, {p_full}]",
            end_indicator.dims()
        );

        let output = self.forward(input);
        let w = output.working_len;

        let start_targets = start_indicator.slice([0..b, 0..w]).argmax(1).reshape([b]);
        let end_targets   = end_indicator.slice([0..b, 0..w]).argmax(1).reshape([b]);

        let ce = CrossEntropyLossConfig::new().init(&output.start_logits.device());
        let loss = ce.forward(output.start_logits.clone(), start_targets)
            + ce.forward(output.end_logits.clone(), end_targets);
        (loss, output)
    }

    /// Banded span decoding over this output's logits.
    pub fn decode(&self, output: &ReaderOutput<B>) -> DecodedSpans {
        decode_spans(
            output.start_logits.clone(),
            output.end_logits.clone(),
            self.max_span_len,
        )
    }

    /// [word_vector ‖ char_vector] per token. The char vectors are
    /// the final forward/backward states of the character encoder,
    /// batched over every token of the batch at once.
    fn embed_tokens(&self, ids: Tensor<B, 2, Int>, chars: Tensor<B, 3, Int>) -> Tensor<B, 3> {
        let [b, l] = ids.dims();
        let cl = chars.dims()[2];
        let word_dim = self.word_table.dims()[1];
        let char_dim = self.char_table.val().dims()[1];

        let words = self
            .word_table
            .clone()
            .select(0, ids.reshape([b * l]))
            .reshape([b, l, word_dim]);

        let ch_len = char_lengths(chars.clone());
        let ch_emb = self
            .char_table
            .val()
            .select(0, chars.reshape([b * l * cl]))
            .reshape([b * l, cl, char_dim]);
        let ch_emb = self.char_dropout.forward(ch_emb);
        let ch_vec = self.char_encoder.encode(ch_emb, ch_len).final_state;
        let char_width = ch_vec.dims()[1];

        Tensor::cat(vec![words, ch_vec.reshape([b, l, char_width])], 2)
    }

    /// Batch-dimension consistency. A mismatch is a caller bug, not
    /// a recoverable condition — fail fast, never broadcast.
    fn check_shapes(&self, input: &ReaderInput<B>) -> (usize, usize, usize, usize) {
        let [b, p_full] = input.passage_ids.dims();
        let [qb, q_full] = input.question_ids.dims();
        assert_eq!(
            qb, b,
            "Question batch dimension {qb} does not match passage batch dimension {b}"
        );

        let ch = input.passage_chars.dims();
        assert_eq!(
            [ch[0], ch[1]],
            [b, p_full],
            "Passage char grid {ch:?} does not match passage ids [{b}, {p_full}]"
        );
        let qh = input.question_chars.dims();
        assert_eq!(
            [qh[0], qh[1]],
            [b, q_full],
            "Question char grid {qh:?} does not match question ids [{b}, {q_full}]"
        );
        assert_eq!(
            ch[2], qh[2],
            "Passage and question char grids disagree on chars per token ({} vs {})",
            ch[2], qh[2]
        );

        if !self.optimize_lengths {
            assert_eq!(
                p_full, self.para_limit,
                "Passage width {p_full} does not match the configured limit {}",
                self.para_limit
            );
            assert_eq!(
                q_full, self.ques_limit,
                "Question width {q_full} does not match the configured limit {}",
                self.ques_limit
            );
        }

        (b, p_full, q_full, ch[2])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TB = burn::backend::NdArray;
    type AD = burn::backend::Autodiff<burn::backend::NdArray>;

    fn device() -> NdArrayDevice {
        NdArrayDevice::Default
    }

    /// Small deterministic tables: 10 words × 4, 8 chars × 3,
    /// row 0 all-zero (padding row).
    fn tables() -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let word = (0..10)
            .map(|r| (0..4).map(|c| if r == 0 { 0.0 } else { (r * 4 + c) as f32 * 0.01 }).collect())
            .collect();
        let chars = (0..8)
            .map(|r| (0..3).map(|c| if r == 0 { 0.0 } else { (r * 3 + c) as f32 * 0.02 }).collect())
            .collect();
        (word, chars)
    }

    fn config() -> BidafConfig {
        BidafConfig::new(4, 3, 4, 2)
            .with_keep_prob(1.0)
            .with_max_span_len(3)
            .with_para_limit(5)
            .with_ques_limit(2)
            .with_char_limit(3)
    }

    /// The batch from the worked scenario: one example, passage ids
    /// [3, 7, 2, 9, 0] (true length 4), question ids [5, 6].
    fn input<B: Backend>(device: &B::Device) -> ReaderInput<B> {
        ReaderInput {
            passage_ids:  Tensor::from_ints([[3, 7, 2, 9, 0]], device),
            question_ids: Tensor::from_ints([[5, 6]], device),
            passage_chars: Tensor::from_ints(
                [[[1, 2, 0], [3, 0, 0], [2, 2, 2], [4, 5, 0], [0, 0, 0]]],
                device,
            ),
            question_chars: Tensor::from_ints([[[1, 0, 0], [6, 2, 0]]], device),
        }
    }

    fn indicators<B: Backend>(device: &B::Device) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (
            Tensor::from_floats([[0.0, 1.0, 0.0, 0.0, 0.0]], device),
            Tensor::from_floats([[0.0, 0.0, 1.0, 0.0, 0.0]], device),
        )
    }

    #[test]
    fn test_forward_trims_to_true_length_and_masks_nothing_inside() {
        let (word, chars) = tables();
        let model = config().init::<TB>(&word, &chars, &device()).unwrap();

        let out = model.forward(input(&device()));
        assert_eq!(out.working_len, 4);
        assert_eq!(out.start_logits.dims(), [1, 4]);

        let mask: Vec<bool> = out.passage_mask.into_data().iter::<bool>().collect();
        assert_eq!(mask, vec![true, true, true, true]);
    }

    #[test]
    fn test_loss_is_finite_and_non_negative() {
        let (word, chars) = tables();
        let model = config().init::<TB>(&word, &chars, &device()).unwrap();
        let (y1, y2) = indicators(&device());

        let (loss, _) = model.forward_loss(input(&device()), y1, y2);
        let loss: f32 = loss.into_scalar().elem();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn test_loss_ignores_indicator_scale() {
        let (word, chars) = tables();
        let model = config().init::<TB>(&word, &chars, &device()).unwrap();
        let (y1, y2) = indicators(&device());

        let (loss, _) = model.forward_loss(input(&device()), y1.clone(), y2.clone());
        let (scaled, _) = model.forward_loss(input(&device()), y1 * 2.5, y2 * 2.5);

        let loss: f32 = loss.into_scalar().elem();
        let scaled: f32 = scaled.into_scalar().elem();
        assert_eq!(loss, scaled);
    }

    #[test]
    fn test_decoded_span_is_ordered_banded_and_inside_true_length() {
        let (word, chars) = tables();
        let model = config().init::<TB>(&word, &chars, &device()).unwrap();

        let out = model.forward(input(&device()));
        let decoded = model.decode(&out);
        let span = decoded.spans[0];

        assert!(span.start <= span.end);
        assert!(span.end - span.start <= 3);
        assert!(span.end < 4, "decoder selected a padded position: {span:?}");
    }

    #[test]
    fn test_static_widths_never_select_the_padded_position() {
        let (word, chars) = tables();
        let model = config()
            .with_optimize_lengths(false)
            .init::<TB>(&word, &chars, &device())
            .unwrap();

        let out = model.forward(input(&device()));
        assert_eq!(out.working_len, 5);

        let mask: Vec<bool> = out.passage_mask.clone().into_data().iter::<bool>().collect();
        assert_eq!(mask, vec![true, true, true, true, false]);

        let span = model.decode(&out).spans[0];
        assert!(span.end < 4);
    }

    #[test]
    fn test_single_token_passage_decodes_to_zero_zero() {
        let (word, chars) = tables();
        let model = config()
            .with_para_limit(1)
            .init::<TB>(&word, &chars, &device())
            .unwrap();

        let out = model.forward(ReaderInput {
            passage_ids:    Tensor::from_ints([[3]], &device()),
            question_ids:   Tensor::from_ints([[5, 6]], &device()),
            passage_chars:  Tensor::from_ints([[[1, 2, 0]]], &device()),
            question_chars: Tensor::from_ints([[[1, 0, 0], [6, 2, 0]]], &device()),
        });
        let decoded = model.decode(&out);
        assert_eq!((decoded.spans[0].start, decoded.spans[0].end), (0, 0));
    }

    #[test]
    fn test_forward_is_deterministic_with_dropout_disabled() {
        let (word, chars) = tables();
        let model = config().init::<TB>(&word, &chars, &device()).unwrap();

        let a = model.forward(input(&device()));
        let b = model.forward(input(&device()));

        let a_start: Vec<f32> = a.start_logits.into_data().iter::<f32>().collect();
        let b_start: Vec<f32> = b.start_logits.into_data().iter::<f32>().collect();
        assert_eq!(a_start, b_start);

        let a_end: Vec<f32> = a.end_logits.into_data().iter::<f32>().collect();
        let b_end: Vec<f32> = b.end_logits.into_data().iter::<f32>().collect();
        assert_eq!(a_end, b_end);
    }

    #[test]
    fn test_loss_backward_flows_through_the_whole_graph() {
        let (word, chars) = tables();
        let model = config().init::<AD>(&word, &chars, &device()).unwrap();
        let (y1, y2) = indicators(&device());

        let (loss, _) = model.forward_loss(input(&device()), y1, y2);
        // The graph must be differentiable end to end
        let _grads = loss.backward();
    }

    #[test]
    fn test_fused_encoder_variant_runs_the_same_batch() {
        let (word, chars) = tables();
        let model = config()
            .with_encoder(EncoderKind::Fused)
            .init::<TB>(&word, &chars, &device())
            .unwrap();

        let out = model.forward(input(&device()));
        let span = model.decode(&out).spans[0];
        assert!(span.start <= span.end);
        assert!(span.end < 4);
    }

    #[test]
    fn test_ragged_embedding_matrix_is_rejected() {
        let (mut word, chars) = tables();
        word[3] = vec![1.0, 2.0];

        let err = config().init::<TB>(&word, &chars, &device()).unwrap_err();
        assert!(err.to_string().contains("Dimension mismatch"));
    }

    #[test]
    fn test_wrong_word_dim_is_rejected() {
        let (word, chars) = tables();
        let err = BidafConfig::new(7, 3, 4, 2)
            .with_para_limit(5)
            .with_ques_limit(2)
            .with_char_limit(3)
            .init::<TB>(&word, &chars, &device())
            .unwrap_err();
        assert!(err.to_string().contains("word"));
    }
}
