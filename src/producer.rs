//! NATS publisher for prediction replies

use crate::types::prediction::PredictionReply;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes replies to the requester's inbox, or to a fallback subject
/// when the request carried none.
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
    fallback_subject: String,
}

impl ReplyProducer {
    /// Create a new reply producer
    pub fn new(client: Client, fallback_subject: &str) -> Self {
        Self {
            client,
            fallback_subject: fallback_subject.to_string(),
        }
    }

    /// Publish a reply
    pub async fn publish(&self, reply_to: Option<Subject>, reply: &PredictionReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        let subject = reply_to.unwrap_or_else(|| Subject::from(self.fallback_subject.clone()));

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            request_id = %reply.request_id,
            subject = %subject,
            status = ?reply.status,
            "Published prediction reply"
        );

        Ok(())
    }

    /// Get the fallback subject name
    pub fn fallback_subject(&self) -> &str {
        &self.fallback_subject
    }
}
