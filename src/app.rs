//! Render cycle orchestration
//!
//! GREET → REGISTER? → LISTEN → TRANSCRIBE → PLAN → SPEAK → RENDER
//!
//! One call to [`AppLoop::render`] is one page interaction. The session
//! carries everything that must survive between interactions.

use crate::audio::AudioClip;
use crate::error::AssistantError;
use crate::faq::load_faq;
use crate::models::{Page, SpeechClip};
use crate::planner::FinancialPlannerClient;
use crate::session::{Session, SessionEvent, Transition};
use crate::speech::SpeechSynthesizer;
use crate::transcriber::Transcriber;
use crate::Result;
use base64::Engine;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GREETING: &str = "Halo! Kenalin nama, profil, dan kondisi keuangan kamu dong!";
pub const REGISTRATION_PROMPT: &str =
    "Untuk proses registrasi, tolong sebutkan nomor telephone kamu!";

pub struct AppLoop {
    transcriber: Transcriber,
    planner: FinancialPlannerClient,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    faq_path: PathBuf,
    stage_timeout: Duration,
}

impl AppLoop {
    pub fn new(
        transcriber: Transcriber,
        planner: FinancialPlannerClient,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        faq_path: PathBuf,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            transcriber,
            planner,
            synthesizer,
            faq_path,
            stage_timeout,
        }
    }

    /// Run one render cycle. `audio` is the uploaded recording; empty means none.
    pub async fn render(&self, session: &mut Session, audio: &[u8]) -> Result<Page> {
        let mut speech = Vec::new();
        let mut audio = audio;

        loop {
            if !session.is_greeted() {
                speech.push(self.speak(GREETING).await?);
                session.mark_greeted();
            }

            if !session.is_registered() {
                speech.push(self.speak(REGISTRATION_PROMPT).await?);

                let Some(clip) = captured(audio)? else {
                    break;
                };
                let text = self
                    .timed("transcribe", self.transcriber.transcribe(&clip))
                    .await?;

                if session.apply(SessionEvent::Utterance(text))? == Transition::Registered {
                    // Start over without the recording that was just consumed.
                    audio = &[];
                    continue;
                }
                break;
            }

            if let Some(clip) = captured(audio)? {
                speech.push(self.converse(session, &clip).await?);
            }
            break;
        }

        let faq = load_faq(&self.faq_path).await?;

        Ok(Page {
            session_id: session.id(),
            registered: session.is_registered(),
            profile: session.profile().map(str::to_string),
            speech,
            transcript: session.transcript().turns().to_vec(),
            faq,
        })
    }

    /// One exchange: user utterance in, spoken planner reply out
    async fn converse(&self, session: &mut Session, clip: &AudioClip) -> Result<SpeechClip> {
        let text = self
            .timed("transcribe", self.transcriber.transcribe(clip))
            .await?;
        session.apply(SessionEvent::Utterance(text))?;
        let mut exchange = PendingExchange::new(session);

        let outcome = async {
            let turns = exchange.session().transcript().turns();
            let reply = self.timed("planner", self.planner.reply(turns)).await?;
            let clip = self.speak(&reply).await?;
            Ok::<_, AssistantError>((reply, clip))
        }
        .await;

        match outcome {
            Ok((reply, clip)) => {
                exchange.settle(SessionEvent::PlannerReplied(reply))?;
                info!(
                    session_id = %exchange.session().id(),
                    exchanges = exchange.session().transcript().exchanges(),
                    "Exchange completed"
                );
                Ok(clip)
            }
            Err(e) => {
                warn!(session_id = %exchange.session().id(), "Exchange failed: {}", e);
                exchange.settle(SessionEvent::PlannerFailed)?;
                Err(e)
            }
        }
    }

    async fn speak(&self, text: &str) -> Result<SpeechClip> {
        let audio = self
            .timed("synthesize", self.synthesizer.synthesize(text))
            .await?;

        Ok(SpeechClip {
            text: text.to_string(),
            mime_type: self.synthesizer.mime_type().to_string(),
            audio: base64::engine::general_purpose::STANDARD.encode(audio),
            autoplay: true,
        })
    }

    async fn timed<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.stage_timeout, fut)
            .await
            .map_err(|_| AssistantError::Timeout {
                stage,
                seconds: self.stage_timeout.as_secs(),
            })?
    }
}

/// A session waiting on the planner. Dropped unsettled (the request was
/// cancelled mid-exchange), it abandons the exchange so the session can
/// take the next recording.
struct PendingExchange<'a> {
    session: &'a mut Session,
    settled: bool,
}

impl<'a> PendingExchange<'a> {
    fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            settled: false,
        }
    }

    fn session(&self) -> &Session {
        &*self.session
    }

    fn settle(&mut self, event: SessionEvent) -> Result<Transition> {
        self.settled = true;
        self.session.apply(event)
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(session_id = %self.session.id(), "Exchange cancelled before the reply was spoken");
        if let Err(e) = self.session.apply(SessionEvent::PlannerFailed) {
            warn!(session_id = %self.session.id(), "Could not abandon exchange: {}", e);
        }
    }
}

/// Decode the upload; `None` when nothing was recorded this cycle
fn captured(audio: &[u8]) -> Result<Option<AudioClip>> {
    if audio.is_empty() {
        return Ok(None);
    }

    let clip = AudioClip::from_wav(audio)?;
    if clip.is_empty() {
        return Ok(None);
    }

    debug!(
        duration_ms = clip.duration_ms(),
        sample_rate = clip.format().sample_rate,
        channels = clip.format().channels,
        "Recording captured"
    );
    Ok(Some(clip))
}
