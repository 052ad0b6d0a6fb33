// ============================================================
// Layer 4 — Example Loader
// ============================================================
// Reads a preprocessed JSON file of labelled examples. The file
// is an array of ReaderExample objects — word and character ids
// only; tokenisation and vocabulary construction happen upstream
// of this system, which is also where the id conventions
// (0 = padding, 1 = OOV) are fixed.

use anyhow::{ensure, Context, Result};
use std::fs;

use crate::domain::example::ReaderExample;
use crate::domain::traits::ExampleSource;

/// Loads all examples from one JSON file.
/// Implements the ExampleSource trait from Layer 3.
pub struct JsonExampleLoader {
    path: String,
}

impl JsonExampleLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ExampleSource for JsonExampleLoader {
    fn load_all(&self) -> Result<Vec<ReaderExample>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read example file '{}'", self.path))?;
        let examples = parse_examples(&json)
            .with_context(|| format!("Malformed example file '{}'", self.path))?;

        tracing::info!("Loaded {} examples from '{}'", examples.len(), self.path);
        Ok(examples)
    }
}

/// Parse and sanity-check a JSON array of examples.
pub fn parse_examples(json: &str) -> Result<Vec<ReaderExample>> {
    let examples: Vec<ReaderExample> = serde_json::from_str(json)?;
    for ex in &examples {
        ensure!(
            ex.passage_chars.len() == ex.passage_ids.len(),
            "Example '{}': {} passage tokens but {} char rows",
            ex.id,
            ex.passage_ids.len(),
            ex.passage_chars.len()
        );
        ensure!(
            ex.question_chars.len() == ex.question_ids.len(),
            "Example '{}': {} question tokens but {} char rows",
            ex.id,
            ex.question_ids.len(),
            ex.question_chars.len()
        );
    }
    Ok(examples)
}
