// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the reader on a labelled example file
//   2. `predict` — loads a checkpoint and dumps span predictions

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "bidaf-qa",
    version = "0.1.0",
    about = "Train an attention-flow reading model, then point at answer spans."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// The CLI layer only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => self.run_train(args),
            Commands::Predict(args) => self.run_predict(args),
        }
    }

    fn run_train(&self, args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on examples in: {}", args.data_path);

        // Convert CLI args → application config
        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    fn run_predict(&self, args: PredictArgs) -> Result<()> {
        use crate::application::predict_use_case::PredictUseCase;

        let use_case = PredictUseCase::new(&args.checkpoint_dir, &args.embedding_dir)?;
        use_case.predict_to_file(&args.data_path, &args.output)?;

        println!("Predictions written to {}", args.output);
        Ok(())
    }
}
