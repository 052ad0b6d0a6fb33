// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Loads a trained checkpoint and predicts answer spans for a set
// of examples, optionally dumping them to a JSON file keyed by
// example id:
//
//   { "ex-1": { "start": 3, "end": 5, "score": 0.82 }, ... }

use anyhow::Result;
use serde::Serialize;
use std::{collections::BTreeMap, fs};

use crate::data::{featurizer::Featurizer, loader::JsonExampleLoader};
use crate::domain::example::ReaderExample;
use crate::domain::span::SpanPrediction;
use crate::domain::traits::{ExampleSource, SpanPredictor};
use crate::infra::{checkpoint::CheckpointManager, embedding_store::EmbeddingStore};
use crate::ml::inferencer::Inferencer;

/// One row of the prediction dump.
#[derive(Debug, Serialize)]
struct PredictionRecord {
    start: usize,
    end:   usize,
    score: f32,
}

pub struct PredictUseCase {
    featurizer: Featurizer,
    inferencer: Inferencer,
}

impl PredictUseCase {
    /// Rebuild the trained model; the featurisation limits come from
    /// the saved training config so inputs are shaped exactly as
    /// during training.
    pub fn new(checkpoint_dir: impl Into<String>, embedding_dir: impl Into<String>) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(checkpoint_dir);
        let cfg = ckpt_manager.load_config()?;

        let store = EmbeddingStore::new(embedding_dir);
        let word_matrix = store.load_word_matrix()?;
        let char_matrix = store.load_char_matrix()?;

        let inferencer = Inferencer::from_checkpoint(&ckpt_manager, &word_matrix, &char_matrix)?;
        let featurizer = Featurizer::new(cfg.para_limit, cfg.ques_limit, cfg.char_limit);

        Ok(Self { featurizer, inferencer })
    }

    /// Predict spans for every example in a JSON file and write the
    /// id-keyed prediction dump to `output_path`.
    pub fn predict_to_file(&self, data_path: &str, output_path: &str) -> Result<()> {
        let examples = JsonExampleLoader::new(data_path).load_all()?;
        let predictions = self.predict_spans(&examples)?;

        let dump: BTreeMap<String, PredictionRecord> = predictions
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    PredictionRecord { start: p.span.start, end: p.span.end, score: p.score },
                )
            })
            .collect();

        fs::write(output_path, serde_json::to_string_pretty(&dump)?)?;
        tracing::info!("Wrote {} predictions to '{}'", dump.len(), output_path);
        Ok(())
    }
}

impl SpanPredictor for PredictUseCase {
    fn predict_spans(&self, examples: &[ReaderExample]) -> Result<Vec<SpanPrediction>> {
        // Inference must cover every input row, so featurisation
        // never drops an example here.
        let samples: Vec<_> = examples
            .iter()
            .map(|ex| self.featurizer.featurize_for_inference(ex))
            .collect();

        let decoded = self.inferencer.predict(&samples)?;

        Ok(samples
            .into_iter()
            .zip(decoded)
            .map(|(sample, (span, score))| SpanPrediction { id: sample.id, span, score })
            .collect())
    }
}
