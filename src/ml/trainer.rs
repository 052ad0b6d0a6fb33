// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam
// with global-norm gradient clipping.
//
// Backend split:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on MyInnerBackend (Wgpu),
//     which also disables dropout for deterministic evaluation
//
// Train/eval mode and the step counter are plain values owned by
// this loop — nothing here toggles process-wide state.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{ReaderBatch, ReaderBatcher},
    dataset::ReaderDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{BidafConfig, BidafModel, ReaderInput};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

/// Translate the application-level TrainConfig into the model
/// configuration (shared with the inferencer so both sides build
/// the identical architecture).
pub fn model_config(cfg: &TrainConfig) -> Result<BidafConfig> {
    Ok(BidafConfig::new(cfg.word_dim, cfg.char_dim, cfg.hidden, cfg.char_hidden)
        .with_keep_prob(cfg.keep_prob)
        .with_max_span_len(cfg.max_span_len)
        .with_para_limit(cfg.para_limit)
        .with_ques_limit(cfg.ques_limit)
        .with_char_limit(cfg.char_limit)
        .with_encoder(cfg.encoder.parse()?)
        .with_optimize_lengths(cfg.optimize_lengths))
}

fn reader_input<B: Backend>(batch: &ReaderBatch<B>) -> ReaderInput<B> {
    ReaderInput {
        passage_ids:    batch.passage_ids.clone(),
        question_ids:   batch.question_ids.clone(),
        passage_chars:  batch.passage_chars.clone(),
        question_chars: batch.question_chars.clone(),
    }
}

/// Gold class indices from one-hot indicator rows.
fn gold_positions<B: Backend>(indicator: &Tensor<B, 2>) -> Vec<i64> {
    let [n, _p] = indicator.dims();
    indicator
        .clone()
        .argmax(1)
        .reshape([n])
        .into_data()
        .iter::<i64>()
        .collect()
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ReaderDataset,
    val_dataset:   ReaderDataset,
    word_matrix:   &[Vec<f32>],
    char_matrix:   &[Vec<f32>],
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = model_config(cfg)?;
    let mut model: BidafModel<MyBackend> =
        model_cfg.init(word_matrix, char_matrix, &device)?;
    tracing::info!(
        "Model ready: hidden={}, char_hidden={}, encoder={}",
        cfg.hidden,
        cfg.char_hidden,
        cfg.encoder
    );

    // ── Adam with global-norm gradient clipping ───────────────────────────────
    let optim_cfg = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(cfg.grad_clip as f32)));
    let mut optim = optim_cfg.init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_batcher = ReaderBatcher::<MyBackend>::new(device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // Validation on the inner backend — no autodiff overhead
    let val_batcher = ReaderBatcher::<MyInnerBackend>::new(device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut global_step = 0usize;

    for epoch in 1..=cfg.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(
                reader_input(&batch),
                batch.start_indicator.clone(),
                batch.end_indicator.clone(),
            );

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;
            global_step    += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);

            if global_step % 100 == 0 {
                tracing::debug!("step {}: loss={:.4}", global_step, loss_val);
            }
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else {
            f64::NAN
        };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct_start = 0usize;
        let mut correct_end   = 0usize;
        let mut correct_both  = 0usize;
        let mut total_samples = 0usize;

        for batch in val_loader.iter() {
            let (loss, output) = model_valid.forward_loss(
                reader_input(&batch),
                batch.start_indicator.clone(),
                batch.end_indicator.clone(),
            );
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;

            // Exact-match accounting through the banded decoder
            let decoded     = model_valid.decode(&output);
            let gold_starts = gold_positions(&batch.start_indicator);
            let gold_ends   = gold_positions(&batch.end_indicator);

            for (row, span) in decoded.spans.iter().enumerate() {
                let start_hit = span.start as i64 == gold_starts[row];
                let end_hit   = span.end as i64 == gold_ends[row];
                correct_start += start_hit as usize;
                correct_end   += end_hit as usize;
                correct_both  += (start_hit && end_hit) as usize;
            }
            total_samples += decoded.spans.len();
        }

        let avg_val_loss = if val_batches > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let start_acc = if total_samples > 0 { correct_start as f64 / total_samples as f64 } else { 0.0 };
        let end_acc   = if total_samples > 0 { correct_end   as f64 / total_samples as f64 } else { 0.0 };
        let em_acc    = if total_samples > 0 { correct_both  as f64 / total_samples as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | start_acc={:.1}% | end_acc={:.1}% | em={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss,
            start_acc * 100.0, end_acc * 100.0, em_acc * 100.0,
        );

        metrics.log(&EpochMetrics::new(
            epoch,
            avg_train_loss,
            avg_val_loss,
            start_acc,
            end_acc,
            em_acc,
        ))?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete after {} steps", global_step);
    Ok(())
}
