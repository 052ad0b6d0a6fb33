// ============================================================
// Layer 6 — Embedding Store
// ============================================================
// Loads the two pretrained matrices the model is built around:
//
//   word_emb.json — vocab × word_dim, stays frozen in the model
//   char_emb.json — char vocab × char_dim, fine-tuned further
//
// Both files are plain JSON arrays of float rows, produced by the
// same preprocessing step that assigned the token ids. Row 0 is
// the all-zero padding row, row 1 the OOV row — this store only
// checks the matrices are non-empty and rectangular; the id
// conventions belong to the producer.
//
// Missing or malformed matrices are unrecoverable: the model
// cannot be constructed without them, so loading fails with
// context instead of falling back to random tables.

use anyhow::{ensure, Context, Result};
use std::{fs, path::PathBuf};

pub struct EmbeddingStore {
    dir: PathBuf,
}

impl EmbeddingStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    /// Load the frozen word matrix (vocab × word_dim).
    pub fn load_word_matrix(&self) -> Result<Vec<Vec<f32>>> {
        self.load_matrix("word_emb.json")
    }

    /// Load the trainable character matrix (char vocab × char_dim).
    pub fn load_char_matrix(&self) -> Result<Vec<Vec<f32>>> {
        self.load_matrix("char_emb.json")
    }

    fn load_matrix(&self, name: &str) -> Result<Vec<Vec<f32>>> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read embedding matrix '{}'. \
                 Run the preprocessing step that exports the pretrained vectors first.",
                path.display()
            )
        })?;

        let matrix = parse_matrix(&json)
            .with_context(|| format!("Malformed embedding matrix '{}'", path.display()))?;

        tracing::info!(
            "Loaded embedding matrix '{}': {} rows × {} dims",
            name,
            matrix.len(),
            matrix[0].len()
        );
        Ok(matrix)
    }
}

/// Parse a JSON matrix and check it is non-empty and rectangular.
pub fn parse_matrix(json: &str) -> Result<Vec<Vec<f32>>> {
    let matrix: Vec<Vec<f32>> = serde_json::from_str(json)?;
    ensure!(!matrix.is_empty(), "embedding matrix has no rows");

    let width = matrix[0].len();
    ensure!(width > 0, "embedding matrix rows are empty");
    for (index, row) in matrix.iter().enumerate() {
        ensure!(
            row.len() == width,
            "embedding matrix is ragged: row {index} has {} values, expected {width}",
            row.len()
        );
    }
    Ok(matrix)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rectangular_matrix() {
        let matrix = parse_matrix("[[0.0, 0.0], [0.1, -0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[1], vec![0.1, -0.2]);
    }

    #[test]
    fn test_parse_rejects_ragged_matrix() {
        let err = parse_matrix("[[0.0, 0.0], [0.1]]").unwrap_err();
        assert!(err.to_string().contains("ragged"));
    }

    #[test]
    fn test_parse_rejects_empty_matrix() {
        assert!(parse_matrix("[]").is_err());
        assert!(parse_matrix("[[]]").is_err());
    }
}
