// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch:
//
//   epoch      — epoch number (1, 2, 3, ...)
//   train_loss — mean summed start/end cross-entropy, training set
//   val_loss   — the same on the validation set
//   start_acc  — fraction of exactly correct start positions
//   end_acc    — fraction of exactly correct end positions
//   em_acc     — fraction of spans where BOTH boundaries match
//
// Output file: <checkpoint_dir>/metrics.csv. The header is only
// written when the file is new, so repeated runs append.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics for a single training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean batch loss over the training epoch
    pub train_loss: f64,

    /// Mean batch loss on the validation set
    pub val_loss: f64,

    /// Fraction of start positions predicted exactly
    pub start_acc: f64,

    /// Fraction of end positions predicted exactly
    pub end_acc: f64,

    /// Fraction of spans with both boundaries exact
    pub em_acc: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        train_loss: f64,
        val_loss:   f64,
        start_acc:  f64,
        end_acc:    f64,
        em_acc:     f64,
    ) -> Self {
        Self { epoch, train_loss, val_loss, start_acc, end_acc, em_acc }
    }

    /// True when this epoch beat the previous best validation loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,start_acc,end_acc,em_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new CSV row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.start_acc, m.end_acc, m.em_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}, em={:.3}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.em_acc,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 0.2, 0.2, 0.1);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }
}
