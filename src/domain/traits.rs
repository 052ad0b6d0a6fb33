// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers. The application layer programs
// against these traits, so data sources and model backends can
// be swapped without touching the orchestration code.
//
// Reference: Rust Book §10 (Traits)

use anyhow::Result;
use crate::domain::example::ReaderExample;
use crate::domain::span::SpanPrediction;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce labelled reader examples.
///
/// Implementations:
///   - JsonExampleLoader → reads a preprocessed JSON file
pub trait ExampleSource {
    /// Load all available examples from this source.
    fn load_all(&self) -> Result<Vec<ReaderExample>>;
}

// ─── SpanPredictor ────────────────────────────────────────────────────────────
/// Any component that can point at answer spans for a set of
/// examples.
///
/// Implementations:
///   - PredictUseCase → runs the attention-flow model
pub trait SpanPredictor {
    /// Predict one span per example, in input order.
    fn predict_spans(&self, examples: &[ReaderExample]) -> Result<Vec<SpanPrediction>>;
}
