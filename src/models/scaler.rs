//! Numeric scaler fitted jointly on reach, impressions and total interactions

use crate::feature_extractor::SCALED_COLUMNS;
use serde::Deserialize;

/// Width of the column group the scaler was fitted on
pub const SCALED_WIDTH: usize = SCALED_COLUMNS.len();

/// Serialized form of a fitted scaler
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScalerFile {
    MinMax {
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
        #[serde(default)]
        feature_names: Option<Vec<String>>,
    },
    Standard {
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
    },
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Scaler fitted jointly on the three-column group.
///
/// Parameters only make sense for the exact group they were fitted on;
/// rows are always transformed whole. Each kind applies its parameters in
/// the same operation order as the fitting library, so results agree to
/// the bit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScalerFile")]
pub enum Scaler {
    /// `x * scale + min`
    MinMax {
        scale: [f64; SCALED_WIDTH],
        min: [f64; SCALED_WIDTH],
    },
    /// `(x - mean) / scale`
    Standard {
        mean: [f64; SCALED_WIDTH],
        scale: [f64; SCALED_WIDTH],
    },
}

impl Scaler {
    /// Min-max scaler mapping `[data_min, data_max]` onto `feature_range`.
    pub fn min_max(
        data_min: [f64; SCALED_WIDTH],
        data_max: [f64; SCALED_WIDTH],
        feature_range: (f64, f64),
    ) -> Result<Self, String> {
        let (lo, hi) = feature_range;
        if lo.is_nan() || hi.is_nan() || lo >= hi {
            return Err(format!("invalid feature range ({lo}, {hi})"));
        }

        let scale: [f64; SCALED_WIDTH] =
            std::array::from_fn(|i| (hi - lo) / non_constant(data_max[i] - data_min[i]));
        let min = std::array::from_fn(|i| lo - data_min[i] * scale[i]);
        check_finite(scale.iter().chain(min.iter()))?;
        Ok(Scaler::MinMax { scale, min })
    }

    /// Standardizing scaler `(x - mean) / std`.
    pub fn standard(mean: [f64; SCALED_WIDTH], std: [f64; SCALED_WIDTH]) -> Result<Self, String> {
        let scale = std.map(non_constant);
        check_finite(mean.iter().chain(scale.iter()))?;
        Ok(Scaler::Standard { mean, scale })
    }

    /// Forward transform of one `[reach, impressions, total interactions]` row
    pub fn transform_row(&self, row: [f64; SCALED_WIDTH]) -> [f64; SCALED_WIDTH] {
        match self {
            Scaler::MinMax { scale, min } => std::array::from_fn(|i| row[i] * scale[i] + min[i]),
            Scaler::Standard { mean, scale } => {
                std::array::from_fn(|i| (row[i] - mean[i]) / scale[i])
            }
        }
    }

    /// Inverse transform of one row back to original units
    pub fn inverse_transform_row(&self, row: [f64; SCALED_WIDTH]) -> [f64; SCALED_WIDTH] {
        match self {
            Scaler::MinMax { scale, min } => std::array::from_fn(|i| (row[i] - min[i]) / scale[i]),
            Scaler::Standard { mean, scale } => {
                std::array::from_fn(|i| row[i] * scale[i] + mean[i])
            }
        }
    }
}

// Near-constant columns (below ten machine epsilons) are left unscaled.
fn non_constant(v: f64) -> f64 {
    if v.abs() < 10.0 * f64::EPSILON {
        1.0
    } else {
        v
    }
}

fn check_finite<'a>(mut params: impl Iterator<Item = &'a f64>) -> Result<(), String> {
    if params.any(|v| !v.is_finite()) {
        return Err("scaler parameters must be finite".to_string());
    }
    Ok(())
}

fn triple(name: &str, values: Vec<f64>) -> Result<[f64; SCALED_WIDTH], String> {
    let len = values.len();
    values
        .try_into()
        .map_err(|_| format!("{name} has {len} columns, expected {SCALED_WIDTH}"))
}

fn check_names(names: Option<Vec<String>>) -> Result<(), String> {
    match names {
        Some(names) if names.iter().map(String::as_str).ne(SCALED_COLUMNS) => Err(format!(
            "scaler was fitted on {names:?}, expected {SCALED_COLUMNS:?}"
        )),
        _ => Ok(()),
    }
}

impl TryFrom<ScalerFile> for Scaler {
    type Error = String;

    fn try_from(file: ScalerFile) -> Result<Self, Self::Error> {
        match file {
            ScalerFile::MinMax {
                data_min,
                data_max,
                feature_range,
                feature_names,
            } => {
                check_names(feature_names)?;
                Scaler::min_max(
                    triple("data_min", data_min)?,
                    triple("data_max", data_max)?,
                    feature_range,
                )
            }
            ScalerFile::Standard {
                mean,
                scale,
                feature_names,
            } => {
                check_names(feature_names)?;
                Scaler::standard(triple("mean", mean)?, triple("scale", scale)?)
            }
        }
    }
}
