//! Post Engagement Predictor Library
//!
//! Predicts the total interactions of a social-media post by running its
//! attributes through a pre-fitted encoder, scaler and random-forest
//! regressor, and serves predictions over NATS request/reply.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactError, LoadError, PredictError};
pub use feature_extractor::{FeatureExtractor, FeatureRecord};
pub use models::inference::PredictionPipeline;
pub use models::loader::{ArtifactLoader, Artifacts};
pub use producer::ReplyProducer;
pub use types::{post::PostInput, prediction::PredictionReply, prediction::PredictionResult};
