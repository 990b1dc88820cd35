//! Feature assembly for engagement model inference.
//!
//! Builds the 18-column record the regressor was trained on from the nine
//! form fields plus fixed placeholder values, and projects it back onto the
//! training column order before inference.

use crate::error::PredictError;
use crate::types::post::PostInput;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

pub const PAGE_TOTAL_LIKES: &str = "Page total likes";
pub const TYPE: &str = "Type";
pub const CATEGORY: &str = "Category";
pub const POST_MONTH: &str = "Post Month";
pub const POST_WEEKDAY: &str = "Post Weekday";
pub const POST_HOUR: &str = "Post Hour";
pub const PAID: &str = "Paid";
pub const TOTAL_REACH: &str = "Lifetime Post Total Reach";
pub const TOTAL_IMPRESSIONS: &str = "Lifetime Post Total Impressions";
pub const ENGAGED_USERS: &str = "Lifetime Engaged Users";
pub const POST_CONSUMERS: &str = "Lifetime Post Consumers";
pub const POST_CONSUMPTIONS: &str = "Lifetime Post Consumptions";
pub const FAN_IMPRESSIONS: &str = "Lifetime Post Impressions by people who have liked your Page";
pub const FAN_REACH: &str = "Lifetime Post reach by people who like your Page";
pub const FAN_ENGAGED: &str = "Lifetime People who have liked your Page and engaged with your post";
pub const COMMENT: &str = "comment";
pub const LIKE: &str = "like";
pub const SHARE: &str = "share";
pub const TOTAL_INTERACTIONS: &str = "Total Interactions";

/// Column order the regressor was trained with.
pub const MODEL_COLUMNS: [&str; 18] = [
    PAGE_TOTAL_LIKES,
    TYPE,
    CATEGORY,
    POST_MONTH,
    POST_WEEKDAY,
    POST_HOUR,
    PAID,
    TOTAL_REACH,
    TOTAL_IMPRESSIONS,
    ENGAGED_USERS,
    POST_CONSUMERS,
    POST_CONSUMPTIONS,
    FAN_IMPRESSIONS,
    FAN_REACH,
    FAN_ENGAGED,
    COMMENT,
    LIKE,
    SHARE,
];

/// Column group the scaler was fitted on jointly, in fit order.
pub const SCALED_COLUMNS: [&str; 3] = [TOTAL_REACH, TOTAL_IMPRESSIONS, TOTAL_INTERACTIONS];

/// Values for model inputs the form does not collect.
///
/// These must match the reference application exactly; changing any of
/// them shifts every prediction.
pub const FORM_PLACEHOLDERS: [(&str, i64); 9] = [
    (PAGE_TOTAL_LIKES, 139_441),
    (ENGAGED_USERS, 300),
    (POST_CONSUMERS, 200),
    (POST_CONSUMPTIONS, 250),
    (FAN_IMPRESSIONS, 5000),
    (FAN_ENGAGED, 200),
    (COMMENT, 0),
    (LIKE, 0),
    (SHARE, 0),
];

/// A single value in a feature record
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Numeric value, if the cell holds one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }

    /// String form used as an encoder label (`2`, `10000.0`, `1e+16`, `Photo`)
    pub fn label(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => float_label(*v),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Shortest round-trip digits, switching to a signed two-digit exponent
/// below `1e-4` and from `1e16` on, as the encoders' fitted labels are written.
fn float_label(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{v:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if v != 0.0 && (exponent < -4 || exponent >= 16) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let plain = v.to_string();
        if plain.contains('.') {
            plain
        } else {
            plain + ".0"
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Int(v) => serializer.serialize_i64(*v),
            Cell::Float(v) => serializer.serialize_f64(*v),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Ordered, named row of feature values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    entries: Vec<(String, Cell)>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(String, Cell)>) -> Self {
        Self { entries }
    }

    /// Set a column, appending it if it does not exist yet.
    pub fn set(&mut self, column: &str, value: Cell) {
        match self.get_mut(column) {
            Some(cell) => *cell = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Cell> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn into_entries(self) -> Vec<(String, Cell)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Numeric values of `columns`, in that order, as model input.
    ///
    /// Columns not listed are dropped. A missing column or a value that is
    /// still text is a schema mismatch.
    pub fn project(&self, columns: &[&str]) -> Result<Vec<f32>, PredictError> {
        columns
            .iter()
            .map(|&column| {
                let cell = self.get(column).ok_or_else(|| {
                    PredictError::SchemaMismatch(format!("record has no column {column:?}"))
                })?;
                cell.as_f64().map(|v| v as f32).ok_or_else(|| {
                    PredictError::SchemaMismatch(format!(
                        "column {column:?} holds non-numeric value {:?}",
                        cell.label()
                    ))
                })
            })
            .collect()
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, cell) in &self.entries {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

/// Builds the model's full input record from a post.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the 18-column record, in training column order.
    ///
    /// Type stays text until encoding; form integers stay integers so their
    /// encoder labels read `2`, not `2.0`.
    pub fn extract(&self, post: &PostInput) -> FeatureRecord {
        let mut record = FeatureRecord::new();

        for column in MODEL_COLUMNS {
            let cell = match column {
                TYPE => Cell::Text(post.post_type.clone()),
                CATEGORY => Cell::Int(post.category),
                POST_MONTH => Cell::Int(post.month),
                POST_WEEKDAY => Cell::Int(post.weekday),
                POST_HOUR => Cell::Int(post.hour),
                PAID => Cell::Int(post.paid),
                TOTAL_REACH => Cell::Float(post.reach),
                TOTAL_IMPRESSIONS => Cell::Float(post.impressions),
                FAN_REACH => Cell::Float(post.fan_reach),
                _ => Cell::Int(placeholder(column)),
            };
            record.set(column, cell);
        }

        record
    }

}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder(column: &str) -> i64 {
    FORM_PLACEHOLDERS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, value)| *value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_extraction() {
        let record = FeatureExtractor::new().extract(&PostInput::default());

        assert_eq!(record.len(), MODEL_COLUMNS.len());
        assert!(record.columns().eq(MODEL_COLUMNS.iter().copied()));
        assert_eq!(record.get(TYPE), Some(&Cell::Text("Photo".to_string())));
        assert_eq!(record.get(TOTAL_REACH), Some(&Cell::Float(10000.0)));
        assert_eq!(record.get(FAN_REACH), Some(&Cell::Float(5000.0)));
    }

    #[test]
    fn test_placeholders_fill_uncollected_columns() {
        let record = FeatureExtractor::new().extract(&PostInput::default());

        assert_eq!(record.get(PAGE_TOTAL_LIKES), Some(&Cell::Int(139_441)));
        assert_eq!(record.get(ENGAGED_USERS), Some(&Cell::Int(300)));
        assert_eq!(record.get(POST_CONSUMERS), Some(&Cell::Int(200)));
        assert_eq!(record.get(POST_CONSUMPTIONS), Some(&Cell::Int(250)));
        assert_eq!(record.get(FAN_IMPRESSIONS), Some(&Cell::Int(5000)));
        assert_eq!(record.get(FAN_ENGAGED), Some(&Cell::Int(200)));
        for column in [COMMENT, LIKE, SHARE] {
            assert_eq!(record.get(column), Some(&Cell::Int(0)));
        }
    }

    #[test]
    fn test_every_placeholder_is_a_model_column() {
        for (column, _) in FORM_PLACEHOLDERS {
            assert!(MODEL_COLUMNS.contains(&column), "{column}");
        }
    }

    #[test]
    fn test_cell_labels() {
        assert_eq!(Cell::Int(2).label(), "2");
        assert_eq!(Cell::Float(10000.0).label(), "10000.0");
        assert_eq!(Cell::Float(0.25).label(), "0.25");
        assert_eq!(Cell::Text("Photo".to_string()).label(), "Photo");
    }

    #[test]
    fn test_float_labels_use_signed_two_digit_exponents() {
        assert_eq!(Cell::Float(1e16).label(), "1e+16");
        assert_eq!(Cell::Float(1.5e16).label(), "1.5e+16");
        assert_eq!(Cell::Float(1e15).label(), "1000000000000000.0");
        assert_eq!(Cell::Float(1e-5).label(), "1e-05");
        assert_eq!(Cell::Float(2.5e-7).label(), "2.5e-07");
        assert_eq!(Cell::Float(0.0001).label(), "0.0001");
        assert_eq!(Cell::Float(1e300).label(), "1e+300");
        assert_eq!(Cell::Float(0.0).label(), "0.0");
        assert_eq!(Cell::Float(-0.0).label(), "-0.0");
        assert_eq!(Cell::Float(-3e20).label(), "-3e+20");
    }

    #[test]
    fn test_project_reorders_and_drops() {
        let record = FeatureRecord::from_entries(vec![
            ("b".to_string(), Cell::Int(2)),
            ("extra".to_string(), Cell::Int(9)),
            ("a".to_string(), Cell::Float(1.5)),
        ]);

        assert_eq!(record.project(&["a", "b"]).unwrap(), vec![1.5, 2.0]);
    }

    #[test]
    fn test_project_rejects_text_and_missing_columns() {
        let record = FeatureExtractor::new().extract(&PostInput::default());
        assert!(matches!(
            record.project(&MODEL_COLUMNS),
            Err(PredictError::SchemaMismatch(_))
        ));
        assert!(matches!(
            record.project(&["nope"]),
            Err(PredictError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_record_serializes_in_order() {
        let record = FeatureRecord::from_entries(vec![
            ("z".to_string(), Cell::Int(1)),
            ("a".to_string(), Cell::Text("x".to_string())),
        ]);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"z":1,"a":"x"}"#);
    }
}
