// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to any business layer:
//
//   embedding_store.rs — Loads the pretrained word and character
//                        embedding matrices from JSON files and
//                        validates that they are rectangular.
//
//   checkpoint.rs      — Saving and loading model weights with
//                        Burn's CompactRecorder, plus the training
//                        config JSON inference needs to rebuild
//                        the exact architecture.
//
//   metrics.rs         — Per-epoch training metrics appended to a
//                        CSV file for later analysis.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Pretrained embedding matrix loading
pub mod embedding_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
