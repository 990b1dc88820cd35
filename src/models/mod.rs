//! Fitted artifacts and the prediction pipeline built on them

pub mod encoder;
pub mod inference;
pub mod loader;
pub mod regressor;
pub mod scaler;

pub use encoder::{EncoderSet, LabelEncoder};
pub use inference::PredictionPipeline;
pub use loader::{ArtifactLoader, Artifacts};
pub use regressor::{Regressor, TreeEnsemble};
pub use scaler::Scaler;
