//! Prediction results and the replies sent back to requesters

use crate::error::PredictError;
use crate::feature_extractor::FeatureRecord;
use crate::types::post::PostInput;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// The form values the prediction was made for
    pub input: PostInput,

    /// Predicted total interactions in original units, unrounded
    pub value: f64,

    /// `value` rounded half-to-even for display
    pub rounded: i64,

    /// Raw model output before inverse scaling
    pub scaled: f64,

    /// Assembled record including placeholder values
    pub record: FeatureRecord,

    /// Record after encoding and scaling, including `Total Interactions`
    pub processed: FeatureRecord,
}

impl PredictionResult {
    pub fn new(
        input: PostInput,
        value: f64,
        scaled: f64,
        record: FeatureRecord,
        processed: FeatureRecord,
    ) -> Self {
        Self {
            input,
            value,
            rounded: value.round_ties_even() as i64,
            scaled,
            record,
            processed,
        }
    }

    /// Text bar chart of the user-supplied factors.
    ///
    /// Calendar fields are drawn against their form maximum; the three
    /// audience counts share one scale so they stay comparable.
    pub fn factor_chart(&self, width: usize) -> String {
        let post = &self.input;
        let audience_max = post.reach.max(post.impressions).max(post.fan_reach);

        let factors: [(&str, f64, f64); 8] = [
            ("Category", post.category as f64, 3.0),
            ("Post Month", post.month as f64, 12.0),
            ("Post Weekday", post.weekday as f64, 7.0),
            ("Post Hour", post.hour as f64, 23.0),
            ("Paid", post.paid as f64, 1.0),
            ("Reach", post.reach, audience_max),
            ("Impressions", post.impressions, audience_max),
            ("Fan Reach", post.fan_reach, audience_max),
        ];

        let mut chart = format!("{:<13} {}\n", "Type", post.post_type);
        for (label, value, max) in factors {
            let fraction = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
            let bar = "█".repeat((fraction * width as f64).round() as usize);
            let _ = writeln!(chart, "{label:<13} {bar:<width$} {value}");
        }
        chart
    }

    /// Explanation shown next to the prediction.
    pub fn interpretation(&self) -> String {
        format!(
            "Predicted total interactions: {} (model estimate {:.2}). \
             Higher reach and impressions usually raise interactions; \
             posting hour and weekday also have a strong effect on engagement.",
            self.rounded, self.value
        )
    }
}

/// Reply status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Reply published for each prediction request
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReply {
    /// Unique reply identifier
    pub request_id: String,

    /// Reply generation timestamp
    pub timestamp: DateTime<Utc>,

    pub status: ReplyStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,

    /// Factor bar chart for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,

    /// User-facing failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionReply {
    /// Chart width used in replies
    pub const CHART_WIDTH: usize = 30;

    fn empty(status: ReplyStatus) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            status,
            prediction: None,
            chart: None,
            interpretation: None,
            error: None,
        }
    }

    pub fn success(prediction: PredictionResult) -> Self {
        let mut reply = Self::empty(ReplyStatus::Ok);
        reply.chart = Some(prediction.factor_chart(Self::CHART_WIDTH));
        reply.interpretation = Some(prediction.interpretation());
        reply.prediction = Some(prediction);
        reply
    }

    pub fn failure(error: &PredictError) -> Self {
        Self::failure_message(error.user_message())
    }

    /// Failure for problems outside the pipeline, such as malformed requests
    pub fn failure_message(message: String) -> Self {
        let mut reply = Self::empty(ReplyStatus::Error);
        reply.error = Some(message);
        reply
    }

    pub fn from_result(result: Result<PredictionResult, PredictError>) -> Self {
        match result {
            Ok(prediction) => Self::success(prediction),
            Err(e) => Self::failure(&e),
        }
    }
}
