//! Artifact loader for the model, encoders and scaler

use crate::config::{ArtifactsConfig, ModelFormat};
use crate::error::{ArtifactError, ArtifactKind, LoadError};
use crate::feature_extractor::MODEL_COLUMNS;
use crate::models::encoder::EncoderSet;
use crate::models::regressor::{Regressor, TreeEnsemble};
use crate::models::scaler::Scaler;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

/// The pre-fitted artifact triple, read-only once loaded.
pub struct Artifacts {
    pub model: Box<dyn Regressor>,
    pub encoders: EncoderSet,
    pub scaler: Scaler,
}

impl Artifacts {
    pub fn new(model: Box<dyn Regressor>, encoders: EncoderSet, scaler: Scaler) -> Self {
        Self {
            model,
            encoders,
            scaler,
        }
    }
}

/// Loads all three artifacts or none of them.
pub struct ArtifactLoader {
    config: ArtifactsConfig,
}

impl ArtifactLoader {
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Load the model, encoders and scaler.
    ///
    /// Every artifact is attempted so the error names all that failed.
    pub fn load(&self) -> Result<Artifacts, LoadError> {
        info!(dir = %self.config.dir.display(), "Loading model artifacts");

        let model = self.load_model();
        let encoders = read_json::<EncoderSet>(ArtifactKind::Encoders, &self.config.encoders_path())
            .and_then(|set| {
                set.validate()
                    .map(|_| set)
                    .map_err(|reason| corrupt(ArtifactKind::Encoders, &self.config.encoders_path(), reason))
            });
        let scaler = read_json::<Scaler>(ArtifactKind::Scaler, &self.config.scaler_path());

        match (model, encoders, scaler) {
            (Ok(model), Ok(encoders), Ok(scaler)) => {
                if let Some(n) = model.n_features() {
                    if n != MODEL_COLUMNS.len() {
                        warn!(
                            model_features = n,
                            expected = MODEL_COLUMNS.len(),
                            "Model width differs from the feature schema, predictions will fail"
                        );
                    }
                }
                info!(
                    model = %model.name(),
                    encoders = encoders.len(),
                    encoded_columns = ?encoders.columns().collect::<Vec<_>>(),
                    "Artifacts loaded successfully"
                );
                Ok(Artifacts::new(model, encoders, scaler))
            }
            (model, encoders, scaler) => {
                let failures: Vec<ArtifactError> = [model.err(), encoders.err(), scaler.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                for failure in &failures {
                    error!(artifact = %failure.kind(), error = %failure, "Artifact failed to load");
                }
                Err(LoadError { failures })
            }
        }
    }

    fn load_model(&self) -> Result<Box<dyn Regressor>, ArtifactError> {
        let path = self.config.model_path();
        match self.config.model_format {
            ModelFormat::Json => {
                let forest = read_json::<TreeEnsemble>(ArtifactKind::Model, &path)?;
                info!(trees = forest.tree_count(), path = %path.display(), "Random forest loaded");
                Ok(Box::new(forest))
            }
            ModelFormat::Onnx => load_onnx(&path, self.config.onnx_threads),
        }
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, threads: usize) -> Result<Box<dyn Regressor>, ArtifactError> {
    use crate::models::regressor::OnnxRegressor;

    if !path.exists() {
        return Err(missing(ArtifactKind::Model, path));
    }
    OnnxRegressor::load(path, threads)
        .map(|model| Box::new(model) as Box<dyn Regressor>)
        .map_err(|e| corrupt(ArtifactKind::Model, path, format!("{e:#}")))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path, _threads: usize) -> Result<Box<dyn Regressor>, ArtifactError> {
    if !path.exists() {
        return Err(missing(ArtifactKind::Model, path));
    }
    Err(corrupt(
        ArtifactKind::Model,
        path,
        "built without the onnx feature".to_string(),
    ))
}

fn read_json<T: DeserializeOwned>(kind: ArtifactKind, path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => missing(kind, path),
        _ => corrupt(kind, path, e.to_string()),
    })?;

    let value = serde_json::from_slice(&bytes).map_err(|e| corrupt(kind, path, e.to_string()))?;
    info!(artifact = %kind, path = %path.display(), "Artifact read");
    Ok(value)
}

fn missing(kind: ArtifactKind, path: &Path) -> ArtifactError {
    ArtifactError::Missing {
        kind,
        path: path.to_path_buf(),
    }
}

fn corrupt(kind: ArtifactKind, path: &Path, reason: String) -> ArtifactError {
    ArtifactError::Corrupt {
        kind,
        path: path.to_path_buf(),
        reason,
    }
}
