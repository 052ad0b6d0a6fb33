// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the model, training, and inference code.
// Burn appears outside it only where the framework's traits
// demand it: the data layer (Dataset/Batcher impls) and the
// infra layer (checkpoint records).
//
// What's in this layer:
//
//   mask.rs      — Padding masks, true lengths, flattened
//                  per-token char lengths, masked softmax,
//                  batch-wise length trimming
//
//   encoder.rs   — The GRU cell and the two bidirectional
//                  sequence-encoder variants (Native / Fused),
//                  selected per call site by EncoderKind
//
//   attention.rs — Bidirectional attention flow (C2Q + Q2C over
//                  a learned similarity matrix) and the bilinear
//                  question summarization
//
//   pointer.rs   — The two-step boundary pointer decoder with a
//                  shared additive scorer and a recurrent state
//                  update between the steps
//
//   decode.rs    — Banded outer-product span decoding
//
//   model.rs     — The assembled reader: embedding fusion,
//                  encoders, attention, pointer, loss
//
//   trainer.rs   — Training loop: Adam + gradient clipping,
//                  validation with span decoding, metrics,
//                  checkpoints
//
//   inferencer.rs — Loads a checkpoint and predicts spans
//
// Reference: Seo et al. (2017) Bidirectional Attention Flow
//            Wang & Jiang (2017) Machine Comprehension with
//            Match-LSTM and Answer Pointer

/// Mask, length, and trimming utilities
pub mod mask;

/// GRU cell and bidirectional sequence encoders
pub mod encoder;

/// Attention flow and bilinear summarization
pub mod attention;

/// Two-step boundary pointer decoder
pub mod pointer;

/// Banded span decoding
pub mod decode;

/// The assembled attention-flow reader model
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads a checkpoint and predicts spans
pub mod inferencer;
