// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the `train` and `predict` subcommands and their flags.
// clap's derive macros generate help text, missing-argument
// errors, and type conversion.

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the span reader on a labelled example file
    Train(TrainArgs),

    /// Predict answer spans using a trained checkpoint
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file of pre-tokenised labelled examples
    #[arg(long, default_value = "data/examples.json")]
    pub data_path: String,

    /// Directory holding word_emb.json and char_emb.json
    #[arg(long, default_value = "data/embeddings")]
    pub embedding_dir: String,

    /// Directory to save model checkpoints and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Maximum passage length in tokens
    #[arg(long, default_value_t = 400)]
    pub para_limit: usize,

    /// Maximum question length in tokens
    #[arg(long, default_value_t = 50)]
    pub ques_limit: usize,

    /// Characters kept per token
    #[arg(long, default_value_t = 16)]
    pub char_limit: usize,

    /// Width of one pretrained word vector
    #[arg(long, default_value_t = 300)]
    pub word_dim: usize,

    /// Width of one character vector
    #[arg(long, default_value_t = 8)]
    pub char_dim: usize,

    /// Recurrent width of the context and fusion encoders
    #[arg(long, default_value_t = 75)]
    pub hidden: usize,

    /// Recurrent width of the character encoder
    #[arg(long, default_value_t = 100)]
    pub char_hidden: usize,

    /// Dropout retention probability (1.0 disables dropout)
    #[arg(long, default_value_t = 0.7)]
    pub keep_prob: f64,

    /// Widest answer span the decoder may emit (end - start)
    #[arg(long, default_value_t = 15)]
    pub max_span_len: usize,

    /// Number of samples per forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    /// Global gradient-norm clip
    #[arg(long, default_value_t = 5.0)]
    pub grad_clip: f64,

    /// Proportion of samples kept for training (rest validates)
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    /// Seed for the shuffled split and the data loader
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Sequence encoder variant: 'native' or 'fused'
    #[arg(long, default_value = "native")]
    pub encoder: String,

    /// Trim each batch to its longest true length before encoding
    /// (pass `--optimize-lengths false` to keep the static widths)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub optimize_lengths: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:        a.data_path,
            embedding_dir:    a.embedding_dir,
            checkpoint_dir:   a.checkpoint_dir,
            para_limit:       a.para_limit,
            ques_limit:       a.ques_limit,
            char_limit:       a.char_limit,
            word_dim:         a.word_dim,
            char_dim:         a.char_dim,
            hidden:           a.hidden,
            char_hidden:      a.char_hidden,
            keep_prob:        a.keep_prob,
            max_span_len:     a.max_span_len,
            batch_size:       a.batch_size,
            epochs:           a.epochs,
            lr:               a.lr,
            grad_clip:        a.grad_clip,
            train_fraction:   a.train_fraction,
            seed:             a.seed,
            encoder:          a.encoder,
            optimize_lengths: a.optimize_lengths,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// JSON file of examples to predict spans for
    #[arg(long, default_value = "data/examples.json")]
    pub data_path: String,

    /// Directory holding word_emb.json and char_emb.json
    /// (same matrices used during training)
    #[arg(long, default_value = "data/embeddings")]
    pub embedding_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Where to write the id-keyed prediction JSON
    #[arg(long, default_value = "predictions.json")]
    pub output: String,
}
