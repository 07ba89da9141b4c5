//! Gemini-backed financial planner pipeline
//!
//! Stands in for a hosted agent pipeline: turns the transcript into a prompt,
//! asks Gemini, and answers in the same `financial_planner.replies` shape.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{transcript_from_input, PlannerPipeline, PLANNER_COMPONENT};
use crate::error::AssistantError;
use crate::models::Turn;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const SYSTEM_PROMPT: &str = r#"Kamu adalah perencana keuangan pribadi untuk nasabah tunanetra.

Pedoman:
- Jawab dalam bahasa yang sama dengan nasabah, singkat dan jelas untuk didengar
- Jangan gunakan tabel, daftar bertingkat, atau simbol markdown
- Tanyakan pendapatan, pengeluaran, tabungan, dan tujuan keuangan bila belum diketahui
- Berikan rencana yang konkret dengan angka bila memungkinkan
- Ingatkan risiko secara jujur"#;

pub struct GeminiPipeline {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiPipeline {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_URL.to_string(),
        })
    }

    async fn generate(&self, transcript: &[Turn]) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AssistantError::Planner(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let request = build_request(transcript);

        info!(turns = transcript.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::Planner(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(AssistantError::Planner(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::Planner(format!("Gemini parse error: {}", e))
        })?;

        gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AssistantError::Planner("Empty response from Gemini".to_string()))
    }
}

#[async_trait]
impl PlannerPipeline for GeminiPipeline {
    async fn run(&self, input: Value) -> Result<Value> {
        let transcript = transcript_from_input(&input)?;
        let answer = self.generate(&transcript).await?;
        Ok(json!({ PLANNER_COMPONENT: { "replies": [answer.trim()] } }))
    }
}

/// Map the transcript onto Gemini's user/model turns
fn build_request(transcript: &[Turn]) -> GeminiRequest {
    let contents = transcript
        .iter()
        .map(|turn| Content {
            role: Some(
                match turn.role {
                    crate::models::Role::User => "user",
                    crate::models::Role::Assistant => "model",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: turn.message.clone(),
            }],
        })
        .collect();

    GeminiRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: SYSTEM_PROMPT.to_string(),
            }],
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_roles() {
        let request = build_request(&[
            Turn::user("Saya ingin menabung untuk rumah"),
            Turn::assistant("Berapa penghasilan bulanan kamu?"),
        ]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Saya ingin menabung untuk rumah");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("perencana keuangan"));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "Baik."}]}, "finishReason": "STOP"}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "Baik.");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let pipeline = GeminiPipeline::new(String::new(), Duration::from_secs(5)).unwrap();
        let input = crate::planner::pipeline_input(&[Turn::user("hello")]);

        let error_msg = pipeline.run(input).await.unwrap_err().to_string();
        assert!(error_msg.contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_input_without_chat_rejected() {
        let pipeline = GeminiPipeline::new("key".to_string(), Duration::from_secs(5)).unwrap();
        let result = pipeline.run(json!({"messages": []})).await;
        assert!(matches!(result, Err(AssistantError::Planner(_))));
    }
}
