//! Model persistence
//!
//! Writes the selected model with its metadata to a single binary file and
//! reads it back for prediction.

mod serializer;

pub use serializer::{load_model, save_best, ModelMetadata, PersistedModel};
