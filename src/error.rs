//! Error types for artifact loading and prediction

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The three artifacts the predictor needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Encoders,
    Scaler,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Encoders => write!(f, "encoders"),
            ArtifactKind::Scaler => write!(f, "scaler"),
        }
    }
}

/// Failure to load a single artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Artifact file does not exist
    #[error("missing {kind} artifact at {}", path.display())]
    Missing { kind: ArtifactKind, path: PathBuf },

    /// Artifact file exists but could not be read or deserialized
    #[error("corrupt {kind} artifact at {}: {reason}", path.display())]
    Corrupt {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
}

impl ArtifactError {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactError::Missing { kind, .. } | ArtifactError::Corrupt { kind, .. } => *kind,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ArtifactError::Missing { .. })
    }
}

/// Aggregate failure of the artifact triple. Never partially successful.
#[derive(Debug, Error)]
#[error("failed to load model artifacts: {}", join_failures(.failures))]
pub struct LoadError {
    pub failures: Vec<ArtifactError>,
}

impl LoadError {
    pub fn any_missing(&self) -> bool {
        self.failures.iter().any(ArtifactError::is_missing)
    }
}

fn join_failures(failures: &[ArtifactError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runtime failure while turning a post into a prediction
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    /// Form value outside its allowed range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Categorical value never seen when the encoder was fitted
    #[error("unknown category {value:?} for column {column:?}")]
    UnknownCategory { column: String, value: String },

    /// Record shape disagrees with what an artifact expects
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Model evaluation failed or produced an unusable value
    #[error("inference failure: {0}")]
    InferenceFailure(String),
}

impl PredictError {
    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidInput(_) => "invalid_input",
            PredictError::UnknownCategory { .. } => "unknown_category",
            PredictError::SchemaMismatch(_) => "schema_mismatch",
            PredictError::InferenceFailure(_) => "inference_failure",
        }
    }

    /// Message shown to the requester
    pub fn user_message(&self) -> String {
        format!("prediction failed: {self}")
    }
}
