//! Agent pipeline served over HTTP
//!
//! Posts the pipeline input as JSON and returns the JSON result untouched.

use super::PlannerPipeline;
use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

pub struct RemotePipeline {
    client: Client,
    url: String,
}

impl RemotePipeline {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl PlannerPipeline for RemotePipeline {
    async fn run(&self, input: Value) -> Result<Value> {
        debug!(url = %self.url, "Running planner pipeline");

        let response = self
            .client
            .post(&self.url)
            .json(&input)
            .send()
            .await
            .map_err(|e| {
                error!("Planner pipeline request failed: {}", e);
                AssistantError::Planner(format!("pipeline request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Planner pipeline error response {}: {}", status, body);
            return Err(AssistantError::Planner(format!(
                "pipeline returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AssistantError::MalformedReply(format!("pipeline body is not JSON: {}", e)))
    }
}
