//! Categorical label encoders

use crate::error::PredictError;
use crate::feature_extractor::{Cell, FeatureRecord};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Fitted mapping from label to integer code.
///
/// Codes are positions in the sorted vocabulary seen at fit time.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build an encoder from its fitted vocabulary.
    ///
    /// Fails unless the classes are sorted and unique, which every fitted
    /// label encoder guarantees.
    pub fn new(classes: Vec<String>) -> Result<Self, String> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("encoder has no classes".to_string());
        }
        if let Some(pair) = self.classes.windows(2).find(|w| w[0] >= w[1]) {
            return Err(format!(
                "classes must be sorted and unique, found {:?} before {:?}",
                pair[0], pair[1]
            ));
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code for `label`, if it was in the fitted vocabulary
    pub fn transform(&self, label: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .ok()
            .map(|idx| idx as i64)
    }
}

/// Encoders keyed by the column they were fitted on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct EncoderSet {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl EncoderSet {
    pub fn new(encoders: BTreeMap<String, LabelEncoder>) -> Self {
        Self { encoders }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for (column, encoder) in &self.encoders {
            encoder
                .validate()
                .map_err(|e| format!("encoder for {column:?}: {e}"))?;
        }
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Replace every encoded column's value with its code, in place.
    pub fn encode_record(&self, record: &mut FeatureRecord) -> Result<(), PredictError> {
        for (column, encoder) in &self.encoders {
            let cell = record.get_mut(column).ok_or_else(|| {
                PredictError::SchemaMismatch(format!(
                    "encoder column {column:?} is not in the record"
                ))
            })?;

            let label = cell.label();
            let code = encoder
                .transform(&label)
                .ok_or_else(|| PredictError::UnknownCategory {
                    column: column.clone(),
                    value: label,
                })?;
            *cell = Cell::Int(code);
        }
        Ok(())
    }
}
