//! FinNetra voice assistant
//!
//! A voice-first financial planner for visually impaired users:
//! - Records an utterance in the browser
//! - Transcribes it with a Whisper model
//! - Sends the whole conversation to a financial-planning agent pipeline
//! - Speaks the reply back through ElevenLabs
//!
//! RENDER CYCLE:
//! GREET → REGISTER? → LISTEN → TRANSCRIBE → PLAN → SPEAK → RENDER

pub mod api;
pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod faq;
pub mod models;
pub mod planner;
pub mod session;
pub mod speech;
pub mod transcriber;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use app::AppLoop;
pub use session::{Phase, Session, SessionEvent};
