//! Whisper inference server client
//!
//! Talks to a Whisper server over multipart HTTP. One client is built at
//! startup and reused for every request (connection pooling).

use super::{DecodeOptions, SpeechModel};
use crate::audio::{encode_wav_f32, TARGET_FORMAT};
use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

pub struct WhisperHttpModel {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    text: String,
}

impl WhisperHttpModel {
    pub fn load(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| AssistantError::Config(format!("invalid WHISPER_URL {}: {}", url, e)))?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()?;

        info!(%url, "Whisper model handle ready");
        Ok(Self { client, url })
    }

    fn form(samples: &[f32], options: &DecodeOptions) -> Result<Form> {
        let wav = encode_wav_f32(samples, TARGET_FORMAT.sample_rate)?;
        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        Ok(Form::new()
            .part("file", part)
            .text("language", options.language.clone())
            .text("beam_size", options.beam_size.to_string())
            .text("best_of", options.best_of.to_string())
            .text("task", options.task.to_string())
            .text("temperature", "0.0")
            .text("response_format", "json"))
    }
}

#[async_trait]
impl SpeechModel for WhisperHttpModel {
    async fn transcribe(&self, samples: &[f32], options: &DecodeOptions) -> Result<String> {
        let form = Self::form(samples, options)?;

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Whisper request failed: {}", e);
                AssistantError::Transcription(format!("Whisper request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Whisper error response {}: {}", status, body);
            return Err(AssistantError::Transcription(format!(
                "Whisper returned {}: {}",
                status, body
            )));
        }

        let parsed: InferenceResponse = response.json().await.map_err(|e| {
            AssistantError::Transcription(format!("Whisper parse error: {}", e))
        })?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_bad_url() {
        let result = WhisperHttpModel::load("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn test_load_accepts_default_url() {
        let model = WhisperHttpModel::load(
            crate::config::DEFAULT_WHISPER_URL,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(model.url.path(), "/inference");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: InferenceResponse =
            serde_json::from_str(r#"{"text": " 08123456789"}"#).unwrap();
        assert_eq!(parsed.text, " 08123456789");
    }
}
