//! Test Prediction Requester
//!
//! Sends randomly generated post attributes to the predictor over NATS and
//! prints each reply. Without a NATS server it loads the artifacts from
//! `config/config.toml` and runs the pipeline in-process instead.

use anyhow::Context;
use engagement_predictor::{AppConfig, ArtifactLoader, PostInput, PredictionPipeline, PredictionReply};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const POST_TYPES: [&str; 4] = ["Photo", "Status", "Link", "Video"];

/// Post generator for testing
struct PostGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PostGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a post the form would accept
    fn generate_valid(&mut self) -> PostInput {
        let reach = self.rng.gen_range(100.0..150_000.0_f64).round();
        PostInput {
            post_type: POST_TYPES[self.rng.gen_range(0..POST_TYPES.len())].to_string(),
            category: self.rng.gen_range(1..=3),
            month: self.rng.gen_range(1..=12),
            weekday: self.rng.gen_range(1..=7),
            hour: self.rng.gen_range(0..=23),
            paid: i64::from(self.rng.gen_bool(0.3)),
            reach,
            impressions: (reach * self.rng.gen_range(1.0..3.0)).round(),
            fan_reach: (reach * self.rng.gen_range(0.1..0.9)).round(),
        }
    }

    /// Generate a post whose type was never seen by the encoder
    fn generate_unknown_type(&mut self) -> PostInput {
        PostInput {
            post_type: "Reel".to_string(),
            ..self.generate_valid()
        }
    }
}

fn print_reply(i: u64, reply: &serde_json::Value) {
    match reply["status"].as_str() {
        Some("ok") => info!(
            "Request {}: {} interactions\n{}",
            i,
            reply["prediction"]["rounded"],
            reply["chart"].as_str().unwrap_or_default()
        ),
        _ => warn!("Request {}: {}", i, reply["error"]),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Requester");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("engagement.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let unknown_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        unknown_rate = unknown_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running the pipeline locally.");
            return run_local_mode(count, unknown_rate, delay_ms).await;
        }
    };

    let mut generator = PostGenerator::new();
    let mut rng = rand::thread_rng();
    let mut failed = 0;

    for i in 1..=count {
        let post = if rng.gen_bool(unknown_rate) {
            generator.generate_unknown_type()
        } else {
            generator.generate_valid()
        };

        let payload = serde_json::to_vec(&post)?;
        let message = client.request(subject.to_string(), payload.into()).await?;
        let reply: serde_json::Value = serde_json::from_slice(&message.payload)?;

        if reply["status"] != "ok" {
            failed += 1;
        }
        print_reply(i, &reply);

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} requests ({} failed)", count, failed);

    Ok(())
}

async fn run_local_mode(count: u64, unknown_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Local mode needs config/config.toml")?;
    let artifacts = ArtifactLoader::new(&config.artifacts).load()?;
    let pipeline = PredictionPipeline::new(Arc::new(artifacts));

    let mut generator = PostGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 1..=count {
        let post = if rng.gen_bool(unknown_rate) {
            generator.generate_unknown_type()
        } else {
            generator.generate_valid()
        };

        let reply = PredictionReply::from_result(pipeline.predict(&post));
        print_reply(i, &serde_json::to_value(&reply)?);

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
