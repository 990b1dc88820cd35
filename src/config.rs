//! Configuration management for the engagement predictor

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk format of the regression model artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Random forest exported as JSON trees
    #[default]
    Json,
    /// ONNX graph evaluated through ONNX Runtime
    Onnx,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject for replies when a request carries no reply inbox
    pub reply_subject: String,
    /// Queue group shared by service replicas; empty or absent subscribes plainly
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Locations of the three pre-fitted artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding the artifact files
    pub dir: PathBuf,
    #[serde(default)]
    pub model_format: ModelFormat,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_encoders_file")]
    pub encoders_file: String,
    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
    /// Intra-op threads for ONNX inference (ignored for JSON models)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_file() -> String {
    "rf_model.json".to_string()
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl ArtifactsConfig {
    /// Config pointing at `dir` with the default file names.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            model_format: ModelFormat::Json,
            model_file: default_model_file(),
            encoders_file: default_encoders_file(),
            scaler_file: default_scaler_file(),
            onnx_threads: default_onnx_threads(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn encoders_path(&self) -> PathBuf {
        self.dir.join(&self.encoders_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler_file)
    }
}

/// Request processing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of requests handled concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `ENGAGEMENT__SECTION__KEY` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("ENGAGEMENT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "engagement.predict".to_string(),
                reply_subject: "engagement.predictions".to_string(),
                queue_group: Some("engagement-predictor".to_string()),
            },
            artifacts: ArtifactsConfig::in_dir("artifacts"),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
