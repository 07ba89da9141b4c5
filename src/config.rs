//! Environment configuration
//!
//! Values come from the process environment, usually populated from `.env`
//! by `dotenv` at startup.

use crate::error::AssistantError;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TTS_VOICE: &str = "Rachel";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_WHISPER_URL: &str = "http://127.0.0.1:8080/inference";
pub const DEFAULT_FAQ_PATH: &str = "./faq.json";
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Which agent pipeline backs the financial planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerBackend {
    Remote { url: String },
    Gemini { api_key: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub whisper_language: String,
    pub whisper_url: String,
    pub tts_api_key: String,
    pub tts_voice: String,
    pub tts_model: String,
    pub planner: PlannerBackend,
    pub faq_path: PathBuf,
    pub port: u16,
    pub service_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AssistantError::Config(format!("{} is not set", key)))
        };

        let planner = match (get("PLANNER_URL"), get("GEMINI_API_KEY")) {
            (Some(url), _) => PlannerBackend::Remote { url },
            (None, Some(api_key)) => PlannerBackend::Gemini { api_key },
            (None, None) => {
                return Err(AssistantError::Config(
                    "either PLANNER_URL or GEMINI_API_KEY must be set".to_string(),
                ))
            }
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| AssistantError::Config(format!("invalid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match get("SERVICE_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                AssistantError::Config(format!("invalid SERVICE_TIMEOUT_SECS: {}", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            whisper_language: required("WHISPER_MODEL_LANGUAGE")?,
            whisper_url: get("WHISPER_URL").unwrap_or_else(|| DEFAULT_WHISPER_URL.to_string()),
            tts_api_key: required("TTS_API_KEY")?,
            tts_voice: get("TTS_VOICE").unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            tts_model: get("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            planner,
            faq_path: get("FAQ_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAQ_PATH)),
            port,
            service_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
