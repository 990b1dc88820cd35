//! Regression models that turn a feature row into a scaled prediction

use crate::error::PredictError;
use serde::Deserialize;

/// A fitted regressor evaluated on one row at a time.
pub trait Regressor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Row width the model was fitted on, when the artifact records it
    fn n_features(&self) -> Option<usize>;

    /// Predict the (scaled) target for a single row
    fn predict(&self, row: &[f32]) -> Result<f64, PredictError>;
}

/// A decision tree node. Children always come after their parent.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn evaluate(&self, row: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if f64::from(row[feature]) <= threshold {
                        left
                    } else {
                        right
                    };
                }
                Node::Leaf { value } => return value,
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {feature}, model has {n_features}"
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= len {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {idx} has non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ForestFile {
    n_features: usize,
    trees: Vec<Tree>,
}

/// Random forest regressor: the mean of its trees' outputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ForestFile")]
pub struct TreeEnsemble {
    n_features: usize,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(n_features: usize, trees: Vec<Tree>) -> Result<Self, String> {
        if trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(Self { n_features, trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl TryFrom<ForestFile> for TreeEnsemble {
    type Error = String;

    fn try_from(file: ForestFile) -> Result<Self, Self::Error> {
        TreeEnsemble::new(file.n_features, file.trees)
    }
}

impl Regressor for TreeEnsemble {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict(&self, row: &[f32]) -> Result<f64, PredictError> {
        if row.len() != self.n_features {
            return Err(PredictError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxRegressor;

#[cfg(feature = "onnx")]
mod onnx {
    use super::Regressor;
    use crate::error::PredictError;
    use anyhow::{Context, Result};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::{debug, info};

    /// Regressor exported to ONNX and run through ONNX Runtime
    pub struct OnnxRegressor {
        /// Sessions need exclusive access to run
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OnnxRegressor {
        /// Load an ONNX regressor from file
        pub fn load<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
            let path = path.as_ref();

            info!(path = %path.display(), threads = threads, "Loading ONNX regressor");

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(threads)?
                .commit_from_file(path)
                .context(format!("Failed to load model from {:?}", path))?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "float_input".to_string());

            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "variable".to_string());

            info!(
                input = %input_name,
                output = %output_name,
                "ONNX regressor loaded"
            );

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        fn run(&self, row: &[f32]) -> Result<f64> {
            let shape = vec![1_i64, row.len() as i64];
            let input_tensor =
                Tensor::from_array((shape, row.to_vec())).context("Failed to create input tensor")?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

            let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

            let output = outputs
                .get(&self.output_name)
                .context(format!("Model has no output named {}", self.output_name))?;
            let (_, data) = output.try_extract_tensor::<f32>()?;

            let value = data
                .first()
                .copied()
                .context("Model returned an empty tensor")?;
            debug!(output = %self.output_name, value = value, "ONNX regressor output");

            Ok(f64::from(value))
        }
    }

    impl Regressor for OnnxRegressor {
        fn name(&self) -> &str {
            "onnx"
        }

        fn n_features(&self) -> Option<usize> {
            None
        }

        fn predict(&self, row: &[f32]) -> Result<f64, PredictError> {
            self.run(row)
                .map_err(|e| PredictError::InferenceFailure(format!("{e:#}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: low },
                Node::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest =
            TreeEnsemble::new(2, vec![stump(0, 0.5, 1.0, 3.0), stump(1, 10.0, 2.0, 4.0)]).unwrap();

        assert_eq!(forest.predict(&[0.2, 5.0]).unwrap(), 1.5);
        assert_eq!(forest.predict(&[0.5, 11.0]).unwrap(), 2.5);
        assert_eq!(forest.predict(&[0.9, 11.0]).unwrap(), 3.5);
    }

    #[test]
    fn test_wrong_width_is_schema_mismatch() {
        let forest = TreeEnsemble::new(2, vec![stump(0, 0.5, 1.0, 3.0)]).unwrap();
        assert!(matches!(
            forest.predict(&[0.2]),
            Err(PredictError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_trees_rejected() {
        assert!(TreeEnsemble::new(2, Vec::new()).is_err());
        assert!(TreeEnsemble::new(1, vec![stump(3, 0.5, 1.0, 3.0)]).is_err());

        let cyclic = Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert!(TreeEnsemble::new(1, vec![cyclic]).is_err());
    }

    #[test]
    fn test_deserialize_forest() {
        let json = r#"{
            "n_features": 1,
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 1.5, "left": 1, "right": 2},
                    {"value": 10.0},
                    {"value": 20.0}
                ]}
            ]
        }"#;

        let forest: TreeEnsemble = serde_json::from_str(json).unwrap();
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(forest.predict(&[2.0]).unwrap(), 20.0);

        let dangling = r#"{"n_features": 1, "trees": [{"nodes": [
            {"feature": 0, "threshold": 1.5, "left": 1, "right": 7},
            {"value": 10.0}
        ]}]}"#;
        assert!(serde_json::from_str::<TreeEnsemble>(dangling).is_err());
    }
}
