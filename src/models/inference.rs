//! Prediction pipeline: post attributes in, total interactions out

use crate::error::PredictError;
use crate::feature_extractor::{
    Cell, FeatureExtractor, FeatureRecord, MODEL_COLUMNS, SCALED_COLUMNS, TOTAL_INTERACTIONS,
};
use crate::models::loader::Artifacts;
use crate::models::scaler::SCALED_WIDTH;
use crate::types::post::PostInput;
use crate::types::prediction::PredictionResult;
use std::sync::Arc;
use tracing::debug;

/// Slot of the prediction within the scaler's column group
const PREDICTION_SLOT: usize = 2;

/// Runs the assemble → encode → scale → reorder → infer → inverse-scale
/// sequence against a shared, read-only artifact set.
#[derive(Clone)]
pub struct PredictionPipeline {
    artifacts: Arc<Artifacts>,
    extractor: Arc<FeatureExtractor>,
}

impl PredictionPipeline {
    pub fn new(artifacts: Arc<Artifacts>) -> Self {
        Self {
            artifacts,
            extractor: Arc::new(FeatureExtractor::new()),
        }
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Predict total interactions for one post.
    pub fn predict(&self, post: &PostInput) -> Result<PredictionResult, PredictError> {
        post.validate()?;

        let record = self.extractor.extract(post);
        let (value, scaled, processed) = self.predict_record(record.clone())?;

        debug!(
            post_type = %post.post_type,
            scaled = scaled,
            value = value,
            "Prediction complete"
        );

        Ok(PredictionResult::new(post.clone(), value, scaled, record, processed))
    }

    /// Encode, scale, reorder and infer an assembled record.
    ///
    /// Returns the prediction in original units, the raw model output and
    /// the transformed record. Construction order of `record` does not
    /// matter; `reorder` fixes the column order.
    pub fn predict_record(
        &self,
        mut record: FeatureRecord,
    ) -> Result<(f64, f64, FeatureRecord), PredictError> {
        self.encode(&mut record)?;
        self.scale(&mut record)?;
        let row = self.reorder(&record)?;
        let scaled = self.infer(&row)?;
        let value = self.inverse_scale(scaled);

        if !value.is_finite() {
            return Err(PredictError::InferenceFailure(format!(
                "prediction {value} is not finite"
            )));
        }

        Ok((value, scaled, record))
    }

    /// Replace categorical values with their fitted codes.
    pub fn encode(&self, record: &mut FeatureRecord) -> Result<(), PredictError> {
        self.artifacts.encoders.encode_record(record)
    }

    /// Add the zero `Total Interactions` column and scale the joint group in place.
    pub fn scale(&self, record: &mut FeatureRecord) -> Result<(), PredictError> {
        record.set(TOTAL_INTERACTIONS, Cell::Int(0));

        let mut group = [0.0; SCALED_WIDTH];
        for (slot, column) in group.iter_mut().zip(SCALED_COLUMNS) {
            *slot = record
                .get(column)
                .and_then(Cell::as_f64)
                .ok_or_else(|| {
                    PredictError::SchemaMismatch(format!(
                        "scaled column {column:?} is missing or non-numeric"
                    ))
                })?;
        }

        let scaled = self.artifacts.scaler.transform_row(group);
        for (column, value) in SCALED_COLUMNS.iter().zip(scaled) {
            record.set(column, Cell::Float(value));
        }
        Ok(())
    }

    /// Project the record onto the training column order.
    pub fn reorder(&self, record: &FeatureRecord) -> Result<Vec<f32>, PredictError> {
        record.project(&MODEL_COLUMNS)
    }

    /// Run the regressor on a single row.
    pub fn infer(&self, row: &[f32]) -> Result<f64, PredictError> {
        let scaled = self.artifacts.model.predict(row)?;
        if scaled.is_finite() {
            Ok(scaled)
        } else {
            Err(PredictError::InferenceFailure(format!(
                "{} returned {scaled}",
                self.artifacts.model.name()
            )))
        }
    }

    /// Decode a scaled prediction back to interaction counts.
    ///
    /// The scaler only inverts whole rows, so the prediction rides in the
    /// `Total Interactions` slot of an otherwise-zero row.
    pub fn inverse_scale(&self, scaled: f64) -> f64 {
        let mut row = [0.0; SCALED_WIDTH];
        row[PREDICTION_SLOT] = scaled;
        self.artifacts.scaler.inverse_transform_row(row)[PREDICTION_SLOT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::encoder::{EncoderSet, LabelEncoder};
    use crate::models::regressor::Regressor;
    use crate::models::scaler::Scaler;
    use std::collections::BTreeMap;

    /// Returns the same output for every row.
    struct Fixed(f64);

    impl Regressor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn n_features(&self) -> Option<usize> {
            None
        }

        fn predict(&self, _row: &[f32]) -> Result<f64, PredictError> {
            Ok(self.0)
        }
    }

    fn artifacts(model: Box<dyn Regressor>) -> Arc<Artifacts> {
        let mut encoders = BTreeMap::new();
        encoders.insert(
            "Type".to_string(),
            LabelEncoder::new(vec![
                "Link".to_string(),
                "Photo".to_string(),
                "Status".to_string(),
                "Video".to_string(),
            ])
            .unwrap(),
        );
        let scaler =
            Scaler::min_max([0.0, 0.0, 0.0], [100_000.0, 200_000.0, 1000.0], (0.0, 1.0)).unwrap();
        Arc::new(Artifacts::new(model, EncoderSet::new(encoders), scaler))
    }

    #[test]
    fn test_model_sees_encoded_scaled_ordered_row() {
        let pipeline = PredictionPipeline::new(artifacts(Box::new(Fixed(0.25))));

        let result = pipeline.predict(&PostInput::default()).unwrap();
        assert!((result.value - 250.0).abs() < 1e-9);
        assert_eq!(result.rounded, 250);

        let processed = &result.processed;
        assert_eq!(processed.get("Type"), Some(&Cell::Int(1)));
        assert_eq!(processed.get(TOTAL_INTERACTIONS), Some(&Cell::Float(0.0)));

        let row = pipeline.reorder(processed).unwrap();
        assert_eq!(row.len(), 18);
        assert_eq!(row[0], 139_441.0);
        assert_eq!(row[1], 1.0);
        assert!((row[7] - 0.1).abs() < 1e-6);
        assert!((row[8] - 0.1).abs() < 1e-6);
        assert_eq!(row[13], 5000.0);
    }

    #[test]
    fn test_inverse_scale_uses_third_slot() {
        let pipeline = PredictionPipeline::new(artifacts(Box::new(Fixed(0.0))));
        assert!((pipeline.inverse_scale(0.5) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_type_stops_before_inference() {
        let pipeline = PredictionPipeline::new(artifacts(Box::new(Fixed(0.25))));
        let post = PostInput {
            post_type: "Reel".to_string(),
            ..PostInput::default()
        };

        assert!(matches!(
            pipeline.predict(&post),
            Err(PredictError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_non_finite_output_is_inference_failure() {
        let pipeline = PredictionPipeline::new(artifacts(Box::new(Fixed(f64::NAN))));
        assert!(matches!(
            pipeline.predict(&PostInput::default()),
            Err(PredictError::InferenceFailure(_))
        ));
    }

    #[test]
    fn test_invalid_input_rejected() {
        let pipeline = PredictionPipeline::new(artifacts(Box::new(Fixed(0.25))));
        let post = PostInput {
            month: 13,
            ..PostInput::default()
        };
        assert!(matches!(
            pipeline.predict(&post),
            Err(PredictError::InvalidInput(_))
        ));
    }
}
