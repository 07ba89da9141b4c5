use finnetra::{
    api::start_server,
    app::AppLoop,
    config::{AppConfig, PlannerBackend},
    planner::{FinancialPlannerClient, GeminiPipeline, PlannerPipeline, RemotePipeline},
    session::{InMemorySessionStore, SessionStore},
    speech::{ElevenLabsSynthesizer, SpeechSynthesizer},
    transcriber::{SpeechModel, Transcriber, WhisperHttpModel},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::from_filename(".env").ok();
    let config = AppConfig::from_env()?;

    info!("🚀 FinNetra voice assistant");
    info!("📍 Port: {}", config.port);

    // The model handle is created once and shared for the life of the process.
    let model: Arc<dyn SpeechModel> = Arc::new(WhisperHttpModel::load(
        &config.whisper_url,
        config.service_timeout,
    )?);
    let transcriber = Transcriber::new(model, config.whisper_language.clone());

    let pipeline: Arc<dyn PlannerPipeline> = match &config.planner {
        PlannerBackend::Remote { url } => {
            info!("Planner backend: remote pipeline at {}", url);
            Arc::new(RemotePipeline::new(url.clone(), config.service_timeout)?)
        }
        PlannerBackend::Gemini { api_key } => {
            info!("Planner backend: gemini");
            Arc::new(GeminiPipeline::new(api_key.clone(), config.service_timeout)?)
        }
    };

    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(ElevenLabsSynthesizer::new(
        config.tts_api_key.clone(),
        config.tts_voice.clone(),
        config.tts_model.clone(),
        config.service_timeout,
    )?);

    let app = Arc::new(AppLoop::new(
        transcriber,
        FinancialPlannerClient::new(pipeline),
        synthesizer,
        config.faq_path.clone(),
        config.service_timeout,
    ));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    info!("✅ Services initialized");
    info!("📡 Starting server...");

    start_server(app, sessions, config.port).await?;

    Ok(())
}
