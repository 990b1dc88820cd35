//! Type definitions for the engagement predictor

pub mod post;
pub mod prediction;

pub use post::PostInput;
pub use prediction::{PredictionReply, PredictionResult, ReplyStatus};
