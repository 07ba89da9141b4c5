//! Conversation session and its state machine
//!
//! Unregistered → Registered ⇄ AwaitingReply
//!
//! Registration happens once, from the first non-empty utterance. After that
//! every utterance opens an exchange that a planner reply (or failure) closes.

use crate::error::AssistantError;
use crate::models::Turn;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

pub mod store;
pub mod transcript;

pub use store::{InMemorySessionStore, SessionHandle, SessionStore};
pub use transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unregistered,
    Registered,
    AwaitingReply,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unregistered => "unregistered",
            Phase::Registered => "registered",
            Phase::AwaitingReply => "awaiting_reply",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A recording was transcribed
    Utterance(String),
    PlannerReplied(String),
    PlannerFailed,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Utterance(_) => "utterance",
            SessionEvent::PlannerReplied(_) => "planner_replied",
            SessionEvent::PlannerFailed => "planner_failed",
        }
    }
}

/// What applying an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Registered,
    Ignored,
    UserTurnAppended,
    AssistantTurnAppended,
    ExchangeAbandoned,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    greeted: bool,
    profile: Option<String>,
    phase: Phase,
    transcript: Transcript,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            greeted: false,
            profile: None,
            phase: Phase::Unregistered,
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_registered(&self) -> bool {
        self.phase != Phase::Unregistered
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_greeted(&self) -> bool {
        self.greeted
    }

    pub(crate) fn mark_greeted(&mut self) {
        self.greeted = true;
    }

    /// Apply an event. Invalid events leave the session untouched.
    pub fn apply(&mut self, event: SessionEvent) -> Result<Transition> {
        let transition = match (self.phase, event) {
            (Phase::Unregistered, SessionEvent::Utterance(text)) => {
                if text.trim().is_empty() {
                    Transition::Ignored
                } else {
                    self.profile = Some(text);
                    self.phase = Phase::Registered;
                    info!(session_id = %self.id, "Session registered");
                    Transition::Registered
                }
            }
            (Phase::Registered, SessionEvent::Utterance(text)) => {
                self.transcript.push(Turn::user(text));
                self.phase = Phase::AwaitingReply;
                Transition::UserTurnAppended
            }
            (Phase::AwaitingReply, SessionEvent::PlannerReplied(reply)) => {
                self.transcript.push(Turn::assistant(reply));
                self.phase = Phase::Registered;
                Transition::AssistantTurnAppended
            }
            (Phase::AwaitingReply, SessionEvent::PlannerFailed) => {
                self.phase = Phase::Registered;
                Transition::ExchangeAbandoned
            }
            (phase, event) => {
                return Err(AssistantError::InvalidTransition {
                    phase: phase.as_str(),
                    event: event.name(),
                })
            }
        };

        debug!(session_id = %self.id, phase = %self.phase, ?transition, "Session event applied");
        Ok(transition)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
