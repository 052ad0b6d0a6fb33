// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load labelled examples     (Layer 4 - data)
//   Step 2: Load pretrained matrices   (Layer 6 - infra)
//   Step 3: Featurise to rectangles    (Layer 4 - data)
//   Step 4: Split train/validation     (Layer 4 - data)
//   Step 5: Build datasets             (Layer 4 - data)
//   Step 6: Save config + metrics CSV  (Layer 6 - infra)
//   Step 7: Run training loop          (Layer 5 - ml)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ReaderDataset,
    featurizer::Featurizer,
    loader::JsonExampleLoader,
    splitter::split_train_val,
};
use crate::domain::traits::ExampleSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    embedding_store::EmbeddingStore,
    metrics::MetricsLogger,
};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All knobs for a training run. Serialisable so the exact
// configuration can be saved next to the checkpoints and reloaded
// for inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:        String,
    pub embedding_dir:    String,
    pub checkpoint_dir:   String,
    pub para_limit:       usize,
    pub ques_limit:       usize,
    pub char_limit:       usize,
    pub word_dim:         usize,
    pub char_dim:         usize,
    pub hidden:           usize,
    pub char_hidden:      usize,
    pub keep_prob:        f64,
    pub max_span_len:     usize,
    pub batch_size:       usize,
    pub epochs:           usize,
    pub lr:               f64,
    pub grad_clip:        f64,
    pub train_fraction:   f64,
    pub seed:             u64,
    pub encoder:          String,
    pub optimize_lengths: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:        "data/examples.json".to_string(),
            embedding_dir:    "data/embeddings".to_string(),
            checkpoint_dir:   "checkpoints".to_string(),
            para_limit:       400,
            ques_limit:       50,
            char_limit:       16,
            word_dim:         300,
            char_dim:         8,
            hidden:           75,
            char_hidden:      100,
            keep_prob:        0.7,
            max_span_len:     15,
            batch_size:       32,
            epochs:           10,
            lr:               2e-4,
            grad_clip:        5.0,
            train_fraction:   0.9,
            seed:             42,
            encoder:          "native".to_string(),
            optimize_lengths: true,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load labelled examples ────────────────────────────────────
        tracing::info!("Loading examples from '{}'", cfg.data_path);
        let examples = JsonExampleLoader::new(&cfg.data_path).load_all()?;
        ensure!(!examples.is_empty(), "Example file '{}' is empty", cfg.data_path);

        // ── Step 2: Load pretrained embedding matrices ────────────────────────
        let store = EmbeddingStore::new(&cfg.embedding_dir);
        let word_matrix = store.load_word_matrix()?;
        let char_matrix = store.load_char_matrix()?;

        // ── Step 3: Featurise to the static limits ────────────────────────────
        let featurizer = Featurizer::new(cfg.para_limit, cfg.ques_limit, cfg.char_limit);
        let samples = featurizer.featurize_all(&examples);
        ensure!(
            !samples.is_empty(),
            "No examples survived featurisation — check the passage limit ({})",
            cfg.para_limit
        );
        tracing::info!("Featurised {} samples", samples.len());

        // ── Step 4: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) =
            split_train_val(samples, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 5: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ReaderDataset::new(train_samples);
        let val_dataset   = ReaderDataset::new(val_samples);

        // ── Step 6: Save config and prepare metrics ───────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 7: Run training loop (Layer 5) ───────────────────────────────
        run_training(
            cfg,
            train_dataset,
            val_dataset,
            &word_matrix,
            &char_matrix,
            ckpt_manager,
            metrics,
        )?;

        Ok(())
    }
}
