// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the model from the saved training config, loads the
// latest checkpoint, and decodes spans for featurised samples in
// batches. Runs on the inner (non-autodiff) backend, which also
// makes every dropout an identity.

use anyhow::Result;
use burn::data::dataloader::batcher::Batcher;

use crate::data::{batcher::ReaderBatcher, featurizer::ReaderSample};
use crate::domain::span::AnswerSpan;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{BidafModel, ReaderInput};
use crate::ml::trainer::model_config;

type InferBackend = burn::backend::Wgpu;

pub struct Inferencer {
    model:      BidafModel<InferBackend>,
    batcher:    ReaderBatcher<InferBackend>,
    batch_size: usize,
}

impl Inferencer {
    /// Rebuild the trained architecture and load the latest weights.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        word_matrix:  &[Vec<f32>],
        char_matrix:  &[Vec<f32>],
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let cfg    = ckpt_manager.load_config()?;

        let model: BidafModel<InferBackend> =
            model_config(&cfg)?.init(word_matrix, char_matrix, &device)?;
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");

        Ok(Self {
            model,
            batcher:    ReaderBatcher::new(device),
            batch_size: cfg.batch_size,
        })
    }

    /// Decode one (span, confidence) pair per sample, in input order.
    pub fn predict(&self, samples: &[ReaderSample]) -> Result<Vec<(AnswerSpan, f32)>> {
        let mut results = Vec::with_capacity(samples.len());

        for chunk in samples.chunks(self.batch_size.max(1)) {
            let batch = self.batcher.batch(chunk.to_vec());
            let output = self.model.forward(ReaderInput {
                passage_ids:    batch.passage_ids,
                question_ids:   batch.question_ids,
                passage_chars:  batch.passage_chars,
                question_chars: batch.question_chars,
            });

            let decoded = self.model.decode(&output);
            for (span, score) in decoded.spans.into_iter().zip(decoded.scores) {
                tracing::debug!("Span [{},{}] conf={:.4}", span.start, span.end, score);
                results.push((span, score));
            }
        }

        Ok(results)
    }
}
