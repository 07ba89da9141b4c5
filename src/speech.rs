//! Text-to-speech via the ElevenLabs streaming API
//!
//! Streamed chunks are gathered into a single buffer that the page plays back
//! with autoplay.

use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into one playable buffer
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    fn mime_type(&self) -> &str {
        "audio/mpeg"
    }
}

pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    voice: String,
    model: String,
    base_url: String,
    voice_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceList {
    voices: Vec<Voice>,
}

#[derive(Debug, Deserialize)]
struct Voice {
    voice_id: String,
    name: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String, voice: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            voice,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            voice_id: OnceCell::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Voices may be configured by name ("Rachel") or by id; names are looked up once.
    async fn voice_id(&self) -> Result<&str> {
        let id = self
            .voice_id
            .get_or_try_init(|| self.lookup_voice_id())
            .await?;

        Ok(id.as_str())
    }

    async fn lookup_voice_id(&self) -> Result<String> {
        if looks_like_voice_id(&self.voice) {
            return Ok(self.voice.clone());
        }

        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Synthesis(format!(
                "voice lookup failed {}: {}",
                status, body
            )));
        }

        let list: VoiceList = response.json().await?;
        let id = find_voice(&list.voices, &self.voice)
            .ok_or_else(|| AssistantError::Synthesis(format!("unknown voice: {}", self.voice)))?;

        info!(voice = %self.voice, voice_id = %id, "Resolved TTS voice");
        Ok(id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let voice_id = self.voice_id().await?;
        let url = format!("{}/v1/text-to-speech/{}/stream", self.base_url, voice_id);

        debug!(voice = %self.voice, model = %self.model, text_len = text.len(), "Starting TTS stream");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&serde_json::json!({
                "text": text,
                "model_id": self.model,
            }))
            .send()
            .await
            .map_err(|e| {
                error!("TTS request failed: {}", e);
                AssistantError::Synthesis(format!("TTS request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("TTS error response {}: {}", status, body);
            return Err(AssistantError::Synthesis(format!(
                "TTS API error {}: {}",
                status, body
            )));
        }

        let audio = accumulate_chunks(response.bytes_stream()).await?;
        info!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

/// Gather a chunk stream into one buffer. Empty chunks are skipped, not errors.
pub async fn accumulate_chunks<S, B, E>(stream: S) -> Result<Vec<u8>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer = Vec::new();
    let mut skipped = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AssistantError::Synthesis(format!("TTS stream error: {}", e)))?;
        let bytes = chunk.as_ref();
        if bytes.is_empty() {
            skipped += 1;
            continue;
        }
        buffer.extend_from_slice(bytes);
    }

    if skipped > 0 {
        debug!(skipped, "Empty TTS chunks skipped");
    }

    Ok(buffer)
}

fn looks_like_voice_id(voice: &str) -> bool {
    voice.len() == 20 && voice.chars().all(|c| c.is_ascii_alphanumeric())
}

fn find_voice(voices: &[Voice], wanted: &str) -> Option<String> {
    voices
        .iter()
        .find(|v| v.name.eq_ignore_ascii_case(wanted))
        .map(|v| v.voice_id.clone())
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_empty_chunks_are_skipped() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> =
            vec![Ok(vec![1, 2]), Ok(vec![]), Ok(vec![3]), Ok(vec![])];

        let audio = accumulate_chunks(stream::iter(chunks)).await.unwrap();
        assert_eq!(audio, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stream_error_aborts() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> =
            vec![Ok(vec![1]), Err("connection reset".to_string())];

        let result = accumulate_chunks(stream::iter(chunks)).await;
        assert!(matches!(result, Err(AssistantError::Synthesis(_))));
    }

    #[test]
    fn test_voice_resolution() {
        assert!(looks_like_voice_id("21m00Tcm4TlvDq8ikWAM"));
        assert!(!looks_like_voice_id("Rachel"));

        let voices = vec![
            Voice {
                voice_id: "AZnzlk1XvdvUeBnXmlld".to_string(),
                name: "Domi".to_string(),
            },
            Voice {
                voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
                name: "Rachel".to_string(),
            },
        ];
        assert_eq!(
            find_voice(&voices, "rachel").as_deref(),
            Some("21m00Tcm4TlvDq8ikWAM")
        );
        assert_eq!(find_voice(&voices, "Bella"), None);
    }

    #[tokio::test]
    async fn test_configured_voice_id_skips_lookup() {
        let synth = ElevenLabsSynthesizer::new(
            "key".to_string(),
            "21m00Tcm4TlvDq8ikWAM".to_string(),
            "eleven_multilingual_v2".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

        assert_eq!(synth.voice_id().await.unwrap(), "21m00Tcm4TlvDq8ikWAM");
    }
}
