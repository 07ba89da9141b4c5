//! Core data models for the voice assistant

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Conversation =================
//

/// Who said a turn. Serialized with the labels the planner pipeline expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "Nasabah")]
    User,
    #[serde(rename = "Anda")]
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "Nasabah",
            Role::Assistant => "Anda",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub message: String,
}

impl Turn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            message: message.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.message)
    }
}

//
// ================= FAQ =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

//
// ================= Page Output =================
//

/// Synthesized speech handed to the page for immediate playback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechClip {
    pub text: String,
    pub mime_type: String,
    /// Base64-encoded audio bytes
    pub audio: String,
    pub autoplay: bool,
}

/// Everything one render cycle produces for the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub session_id: Uuid,
    pub registered: bool,
    pub profile: Option<String>,
    pub speech: Vec<SpeechClip>,
    pub transcript: Vec<Turn>,
    pub faq: Vec<FaqItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_wire_shape() {
        let json = serde_json::to_value(Turn::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "Nasabah", "message": "hello"}));

        let json = serde_json::to_value(Turn::assistant("halo")).unwrap();
        assert_eq!(json["role"], "Anda");
    }

    #[test]
    fn test_turn_display() {
        assert_eq!(Turn::user("berapa tabungan saya?").to_string(), "Nasabah: berapa tabungan saya?");
    }
}
