//! Financial planner client
//!
//! Hands the whole transcript to the agent pipeline and pulls the planner's
//! reply out of the pipeline result.

use crate::error::AssistantError;
use crate::models::Turn;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

pub mod gemini;
pub mod remote;

pub use gemini::GeminiPipeline;
pub use remote::RemotePipeline;

/// Name of the pipeline component whose replies we read
pub const PLANNER_COMPONENT: &str = "financial_planner";

/// A conversational agent pipeline: JSON in, JSON out
#[async_trait]
pub trait PlannerPipeline: Send + Sync {
    async fn run(&self, input: Value) -> Result<Value>;
}

pub struct FinancialPlannerClient {
    pipeline: Arc<dyn PlannerPipeline>,
}

impl FinancialPlannerClient {
    pub fn new(pipeline: Arc<dyn PlannerPipeline>) -> Self {
        Self { pipeline }
    }

    /// Ask the planner for the next reply given the full transcript
    pub async fn reply(&self, transcript: &[Turn]) -> Result<String> {
        let input = pipeline_input(transcript);

        let result = self
            .pipeline
            .run(input)
            .instrument(info_span!("thinking", stage = "planner"))
            .await?;

        let reply = extract_reply(&result)?;
        info!(turns = transcript.len(), reply_chars = reply.chars().count(), "Planner replied");
        Ok(reply)
    }
}

/// `{"chat": {"value": [turns...]}}`
pub fn pipeline_input(transcript: &[Turn]) -> Value {
    json!({ "chat": { "value": transcript } })
}

/// Read `result["financial_planner"]["replies"][0]`
pub fn extract_reply(result: &Value) -> Result<String> {
    result
        .get(PLANNER_COMPONENT)
        .and_then(|planner| planner.get("replies"))
        .and_then(|replies| replies.get(0))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AssistantError::MalformedReply(format!(
                "expected {}.replies[0] as a string, got {}",
                PLANNER_COMPONENT, result
            ))
        })
}

/// Pull the transcript back out of a pipeline input
pub(crate) fn transcript_from_input(input: &Value) -> Result<Vec<Turn>> {
    let value = input
        .get("chat")
        .and_then(|chat| chat.get("value"))
        .cloned()
        .ok_or_else(|| AssistantError::Planner("input has no chat.value".to_string()))?;

    Ok(serde_json::from_value(value)?)
}
