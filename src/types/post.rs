//! Post attributes collected by the prediction form

use crate::error::PredictError;
use serde::{Deserialize, Serialize};

/// Attributes of a post supplied by the user.
///
/// Only these nine fields are collected; the rest of the model's input
/// schema is filled with placeholder constants during feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInput {
    /// Post type (Photo, Status, Link, Video). Checked against the encoder vocabulary.
    #[serde(alias = "Type")]
    pub post_type: String,

    /// Category (1-3)
    #[serde(alias = "Category")]
    pub category: i64,

    /// Month of posting (1-12)
    #[serde(alias = "Post Month")]
    pub month: i64,

    /// Day of week (1 = Monday ... 7 = Sunday)
    #[serde(alias = "Post Weekday")]
    pub weekday: i64,

    /// Hour of posting (0-23)
    #[serde(alias = "Post Hour")]
    pub hour: i64,

    /// Paid promotion flag (0 or 1)
    #[serde(alias = "Paid")]
    pub paid: i64,

    /// Lifetime post total reach
    #[serde(alias = "Lifetime Post Total Reach")]
    pub reach: f64,

    /// Lifetime post total impressions
    #[serde(alias = "Lifetime Post Total Impressions")]
    pub impressions: f64,

    /// Lifetime post reach by people who like the page
    #[serde(alias = "Lifetime Post reach by people who like your Page")]
    pub fan_reach: f64,
}

impl PostInput {
    /// Check every form field against the range the form allows.
    pub fn validate(&self) -> Result<(), PredictError> {
        check_range("category", self.category, 1, 3)?;
        check_range("month", self.month, 1, 12)?;
        check_range("weekday", self.weekday, 1, 7)?;
        check_range("hour", self.hour, 0, 23)?;
        check_range("paid", self.paid, 0, 1)?;
        check_amount("reach", self.reach)?;
        check_amount("impressions", self.impressions)?;
        check_amount("fan_reach", self.fan_reach)?;

        if self.post_type.trim().is_empty() {
            return Err(PredictError::InvalidInput(
                "post_type must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PostInput {
    /// The form's initial values.
    fn default() -> Self {
        Self {
            post_type: "Photo".to_string(),
            category: 1,
            month: 6,
            weekday: 3,
            hour: 12,
            paid: 0,
            reach: 10000.0,
            impressions: 20000.0,
            fan_reach: 5000.0,
        }
    }
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), PredictError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PredictError::InvalidInput(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

fn check_amount(field: &str, value: f64) -> Result<(), PredictError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PredictError::InvalidInput(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}
