//! Engagement Predictor - Main Entry Point
//!
//! Loads the model artifacts once, then answers prediction requests from NATS.

use anyhow::{Context, Result};
use engagement_predictor::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{ArtifactLoader, PredictionPipeline},
    producer::ReplyProducer,
    types::{PostInput, PredictionReply},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("engagement_predictor={}", logging.level).parse()?);

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("ENGAGEMENT_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;
    init_logging(&config.logging)?;

    info!(config = %config_path, "Starting Engagement Predictor");

    // No degraded mode: without all three artifacts the service does not start
    let artifacts = ArtifactLoader::new(&config.artifacts)
        .load()
        .context("Cannot start without model artifacts")?;
    let pipeline = Arc::new(PredictionPipeline::new(Arc::new(artifacts)));

    let metrics = Arc::new(ServiceMetrics::new());

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats);
    let producer = Arc::new(ReplyProducer::new(client.clone(), &config.nats.reply_subject));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        requests = %consumer.subject(),
        queue_group = consumer.queue_group().unwrap_or("-"),
        fallback_replies = %producer.fallback_subject(),
        "Serving predictions"
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            metrics.record_request();

            let reply = match serde_json::from_slice::<PostInput>(&message.payload) {
                Ok(post) => match pipeline.predict(&post) {
                    Ok(prediction) => {
                        let processing_time = start_time.elapsed();
                        metrics.record_prediction(processing_time, prediction.value);
                        debug!(
                            post_type = %post.post_type,
                            prediction = prediction.rounded,
                            processing_time_us = processing_time.as_micros(),
                            "Prediction served"
                        );
                        PredictionReply::success(prediction)
                    }
                    Err(e) => {
                        metrics.record_failure(start_time.elapsed(), e.kind());
                        warn!(error = %e, kind = e.kind(), "Prediction failed");
                        PredictionReply::failure(&e)
                    }
                },
                Err(e) => {
                    metrics.record_failure(start_time.elapsed(), "malformed_request");
                    warn!(error = %e, "Failed to deserialize prediction request");
                    PredictionReply::failure_message(format!("prediction failed: {e}"))
                }
            };

            if let Err(e) = producer.publish(message.reply.clone(), &reply).await {
                error!(
                    request_id = %reply.request_id,
                    error = %e,
                    "Failed to publish prediction reply"
                );
            }

            drop(permit);
        });
    }

    info!("Subscription closed, shutting down");
    metrics.print_summary();

    Ok(())
}
