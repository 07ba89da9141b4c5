//! Speech-to-text
//!
//! Brings a recording to the model's input format (16 kHz, 16-bit, mono),
//! normalizes it to floats and asks the speech model for text.

use crate::audio::{self, AudioClip, AudioFormat, TARGET_FORMAT};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

pub mod whisper;
pub use whisper::WhisperHttpModel;

pub const BEAM_SIZE: u32 = 5;
pub const BEST_OF: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Transcribe,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Transcribe => write!(f, "transcribe"),
        }
    }
}

/// Decoding parameters passed to the model on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeOptions {
    pub language: String,
    pub beam_size: u32,
    pub best_of: u32,
    pub task: Task,
}

impl DecodeOptions {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            beam_size: BEAM_SIZE,
            best_of: BEST_OF,
            task: Task::Transcribe,
        }
    }
}

/// A loaded speech recognition model
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Transcribe mono 16 kHz samples in [-1, 1]
    async fn transcribe(&self, samples: &[f32], options: &DecodeOptions) -> Result<String>;
}

pub struct Transcriber {
    model: Arc<dyn SpeechModel>,
    options: DecodeOptions,
    target: AudioFormat,
}

impl Transcriber {
    /// The model handle is shared; it is loaded once and lives as long as the process.
    pub fn new(model: Arc<dyn SpeechModel>, language: impl Into<String>) -> Self {
        Self {
            model,
            options: DecodeOptions::for_language(language),
            target: TARGET_FORMAT,
        }
    }

    /// Convert a clip to normalized model input
    pub fn prepare(&self, clip: &AudioClip) -> Result<Vec<f32>> {
        let source = clip.format();
        if source != self.target {
            debug!(
                from_rate = source.sample_rate,
                from_width = source.sample_width,
                from_channels = source.channels,
                "Converting recording to model format"
            );
        }

        Ok(audio::normalize(&clip.conform(self.target)?))
    }

    pub async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let samples = self.prepare(clip)?;
        debug!(
            samples = samples.len(),
            fingerprint = %audio::fingerprint(&samples),
            "Prepared model input"
        );

        let text = self
            .model
            .transcribe(&samples, &self.options)
            .instrument(info_span!("thinking", stage = "transcribe"))
            .await?;

        let text = text.trim().to_string();
        info!(chars = text.chars().count(), "Transcription finished");
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Replays scripted transcriptions and records what it was fed
    pub struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        pub calls: Mutex<Vec<(Vec<f32>, DecodeOptions)>>,
    }

    impl ScriptedModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SpeechModel for ScriptedModel {
        async fn transcribe(&self, samples: &[f32], options: &DecodeOptions) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((samples.to_vec(), options.clone()));
            self.replies.lock().unwrap().pop().ok_or_else(|| {
                crate::error::AssistantError::Transcription("script exhausted".to_string())
            })
        }
    }
}
