//! Binary model files: a bincode envelope with magic bytes, format version
//! and an FNV-1a checksum over the encoded model.

use bincode::Options;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::{FraudError, Result};
use crate::training::{Classifier, ClassifierKind, ClassifierModel, EvaluationReport};

/// Descriptive data stored next to the model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Roster name of the selected candidate
    pub name: String,
    pub kind: ClassifierKind,
    /// Test-set accuracy at selection time
    pub accuracy: f64,
    /// Feature columns the model expects, in order
    pub feature_names: Vec<String>,
    pub target: String,
    pub created_at: DateTime<Utc>,
    /// Version of this crate that wrote the file
    pub crate_version: String,
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedModel {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    model_data: Vec<u8>,
    checksum: u64,
}

impl SerializedModel {
    const MAGIC: [u8; 4] = [b'F', b'R', b'D', b'M'];
    const VERSION: u32 = 1;

    fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = fnv1a(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    fn verify(&self, path: &Path) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(FraudError::persistence(format!("{} is not a model file", path.display())));
        }
        if self.format_version != Self::VERSION {
            return Err(FraudError::persistence(format!(
                "Unsupported model format version {} in {} (expected {})",
                self.format_version,
                path.display(),
                Self::VERSION
            )));
        }
        if fnv1a(&self.model_data) != self.checksum {
            return Err(FraudError::persistence(format!(
                "Checksum mismatch in {}; the file is corrupt",
                path.display()
            )));
        }
        Ok(())
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, byte| (hash ^ *byte as u64).wrapping_mul(FNV_PRIME))
}

/// A model read back from disk
#[derive(Debug, Clone)]
pub struct PersistedModel {
    metadata: ModelMetadata,
    model: ClassifierModel,
}

impl PersistedModel {
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    /// Predict labels for rows laid out like `metadata().feature_names`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x).map_err(|e| {
            FraudError::modelling("Prediction with persisted model failed")
                .for_candidate(&self.metadata.name)
                .with_source(e)
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

fn write_envelope(envelope: &SerializedModel, tmp: &Path) -> Result<()> {
    let file = File::create(tmp)
        .map_err(|e| FraudError::persistence(format!("Cannot create {}", tmp.display())).with_source(e))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, envelope)
        .map_err(|e| FraudError::persistence("Failed to encode model file").with_source(e))?;
    writer
        .flush()
        .map_err(|e| FraudError::persistence(format!("Failed to write {}", tmp.display())).with_source(e))?;
    Ok(())
}

/// Serialize the most accurate model in `report` to `path`.
///
/// The file is written to a hidden sibling and renamed into place, so a
/// failed save leaves nothing at `path`.
pub fn save_best(report: &EvaluationReport, path: impl AsRef<Path>) -> Result<ModelMetadata> {
    let path = path.as_ref();
    let best = report
        .best()
        .ok_or_else(|| FraudError::persistence("Evaluation report holds no fitted model"))?;

    let metadata = ModelMetadata {
        name: best.name().to_string(),
        kind: best.model().kind(),
        accuracy: best.accuracy(),
        feature_names: report.feature_names().to_vec(),
        target: report.target().to_string(),
        created_at: Utc::now(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let model_data = bincode::serialize(best.model())
        .map_err(|e| FraudError::persistence("Failed to encode model parameters").with_source(e))?;
    let envelope = SerializedModel::new(metadata.clone(), model_data);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            error!(path = %parent.display(), "Cannot create model directory");
            FraudError::persistence(format!("Cannot create directory {}", parent.display())).with_source(e)
        })?;
    }

    let tmp = temp_path(path);
    if let Err(err) = write_envelope(&envelope, &tmp) {
        let _ = fs::remove_file(&tmp);
        error!(path = %path.display(), error = %err, "Saving model failed");
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FraudError::persistence(format!("Cannot move model into {}", path.display())).with_source(e)
    })?;

    info!(
        path = %path.display(),
        candidate = %metadata.name,
        bytes = envelope.model_data.len(),
        "Best model saved"
    );
    Ok(metadata)
}

/// Read and verify a model written by [`save_best`]
pub fn load_model(path: impl AsRef<Path>) -> Result<PersistedModel> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FraudError::persistence(format!("Model file not found: {}", path.display())));
    }

    let bytes = fs::read(path)
        .map_err(|e| FraudError::persistence(format!("Cannot read {}", path.display())).with_source(e))?;
    if !bytes.starts_with(&SerializedModel::MAGIC) {
        return Err(FraudError::persistence(format!("{} is not a model file", path.display())));
    }
    // Length prefixes can never exceed the file itself
    let envelope: SerializedModel = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(bytes.len() as u64)
        .deserialize(&bytes)
        .map_err(|e| {
            FraudError::persistence(format!("{} is not a readable model file", path.display())).with_source(e)
        })?;
    envelope.verify(path)?;

    let model: ClassifierModel = bincode::deserialize(&envelope.model_data)
        .map_err(|e| FraudError::persistence("Failed to decode model parameters").with_source(e))?;
    if model.kind() != envelope.metadata.kind {
        return Err(FraudError::persistence(format!(
            "Model kind {} does not match metadata kind {}",
            model.kind(),
            envelope.metadata.kind
        )));
    }

    debug!(path = %path.display(), candidate = %envelope.metadata.name, "Model loaded");
    Ok(PersistedModel {
        metadata: envelope.metadata,
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::training::{CandidateSpec, Dataset, ModelEvaluator};
    use crate::error::Stage;
    use tempfile::tempdir;

    fn small_dataset() -> Dataset {
        let y = Array1::from_shape_fn(40, |i| if i % 4 == 0 { 1.0 } else { 0.0 });
        let x = Array2::from_shape_fn((40, 2), |(i, j)| y[i] * 5.0 + (i % 3) as f64 + j as f64);
        Dataset {
            x,
            y,
            feature_names: vec!["amount".to_string(), "log_amount".to_string()],
            target: "isFraud".to_string(),
        }
    }

    fn report_for(dataset: &Dataset) -> EvaluationReport {
        let roster = vec![
            CandidateSpec::new("Decision Tree Classifier", ClassifierKind::DecisionTree),
            CandidateSpec::new("k-Neighbors Classifier", ClassifierKind::KNeighbors),
        ];
        ModelEvaluator::new(EvaluationConfig::default().with_roster(roster))
            .evaluate_dataset(dataset)
            .unwrap()
    }

    #[test]
    fn test_save_and_load_reproduce_predictions() {
        let dataset = small_dataset();
        let report = report_for(&dataset);
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("best_model.bin");

        let saved = save_best(&report, &path).unwrap();
        assert!(path.exists());
        assert!(!temp_path(&path).exists());

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.metadata(), &saved);
        assert_eq!(loaded.metadata().feature_names, dataset.feature_names);
        assert_eq!(loaded.metadata().target, "isFraud");

        let best = report.best().unwrap();
        assert_eq!(loaded.metadata().name, best.name());
        assert_eq!(
            loaded.predict(&dataset.x).unwrap(),
            best.model().predict(&dataset.x).unwrap()
        );
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let report = report_for(&small_dataset());
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save_best(&report, &path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 9;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = load_model(&path).unwrap_err();
        assert_eq!(err.stage(), Stage::Persistence);
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"just some text, not a model").unwrap();
        assert_eq!(load_model(&path).unwrap_err().stage(), Stage::Persistence);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_model(dir.path().join("absent.bin")).unwrap_err();
        assert_eq!(err.stage(), Stage::Persistence);
    }

    #[test]
    fn test_checksum_is_fnv1a() {
        assert_eq!(fnv1a(b""), 14695981039346656037);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }
}
