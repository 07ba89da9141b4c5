//! HTTP server for the voice assistant
//!
//! Serves the page and the session endpoints the page drives.
//! Every page interaction maps to one render cycle on the session.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppLoop;
use crate::error::AssistantError;
use crate::models::Page;
use crate::session::SessionStore;
use crate::Result;

/// Browser recordings are uncompressed WAV
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<AppLoop>,
    pub sessions: Arc<dyn SessionStore>,
}

/// =============================
/// Helpers
/// =============================

fn status_for(error: &AssistantError) -> StatusCode {
    match error {
        AssistantError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AssistantError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AssistantError::Audio(_) => StatusCode::BAD_REQUEST,
        AssistantError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<Page>) -> (StatusCode, Json<ApiResponse>) {
    match result {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::success(page))),
        Err(e) => {
            warn!("Render cycle failed: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

async fn render(state: &ApiState, id: Uuid, audio: &[u8]) -> Result<Page> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    state.app.render(&mut session, audio).await
}

/// =============================
/// Page & Health
/// =============================

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "live_sessions": state.sessions.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Session Endpoints
/// =============================

async fn create_session(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let handle = state.sessions.create().await;
    let mut session = handle.lock().await;
    let id = session.id();

    let result = state.app.render(&mut session, &[]).await;
    drop(session);

    if result.is_err() {
        // The page starts over with a fresh session.
        state.sessions.remove(id).await.ok();
    }
    respond(result)
}

async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    respond(render(&state, id, &[]).await)
}

async fn post_audio(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    info!(session_id = %id, bytes = body.len(), "Received recording");
    respond(render(&state, id, &body).await)
}

async fn delete_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.sessions.remove(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "session_id": id }))),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(app: Arc<AppLoop>, sessions: Arc<dyn SessionStore>) -> Router {
    let state = ApiState { app, sessions };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/audio", post(post_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    app: Arc<AppLoop>,
    sessions: Arc<dyn SessionStore>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(app, sessions);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("FinNetra listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{GREETING, REGISTRATION_PROMPT};
    use crate::audio::encode_wav_pcm16;
    use crate::planner::testing::CannedPipeline;
    use crate::planner::FinancialPlannerClient;
    use crate::session::InMemorySessionStore;
    use crate::speech::testing::EchoSynthesizer;
    use crate::transcriber::testing::ScriptedModel;
    use crate::transcriber::Transcriber;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(transcriptions: &[&str], replies: &[&str]) -> (Router, Arc<InMemorySessionStore>) {
        let faq = std::env::temp_dir().join(format!("finnetra-api-{}.json", Uuid::new_v4()));
        std::fs::write(&faq, r#"[{"question": "Q?", "answer": "A."}]"#).unwrap();

        let app = AppLoop::new(
            Transcriber::new(Arc::new(ScriptedModel::new(transcriptions)), "id"),
            FinancialPlannerClient::new(Arc::new(CannedPipeline::replying(replies))),
            Arc::new(EchoSynthesizer::default()),
            faq,
            Duration::from_secs(5),
        );
        let sessions = Arc::new(InMemorySessionStore::new());
        (create_router(Arc::new(app), sessions.clone()), sessions)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn recording() -> Vec<u8> {
        encode_wav_pcm16(&[300i16; 800], 16_000, 1).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router(&[], &[]);
        let (status, body) = send(&router, "GET", "/health", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["live_sessions"], 0);
    }

    #[tokio::test]
    async fn test_index_serves_page() {
        let (router, _) = router(&[], &[]);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page = String::from_utf8_lossy(&bytes);
        assert!(page.contains("FinNetra"));
        assert!(page.contains("Saya sedang berpikir.."));
        assert!(page.contains("Membuat perencanaan keuanganmu.."));
    }

    #[tokio::test]
    async fn test_conversation_over_http() {
        let (router, sessions) = router(&["08123456789", "halo"], &["Halo juga!"]);

        let (status, body) = send(&router, "POST", "/api/sessions", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["speech"][0]["text"], GREETING);
        assert_eq!(body["data"]["speech"][1]["text"], REGISTRATION_PROMPT);
        let id = body["data"]["session_id"].as_str().unwrap().to_string();
        assert_eq!(sessions.len().await, 1);

        let uri = format!("/api/sessions/{}/audio", id);
        let (status, body) = send(&router, "POST", &uri, recording()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["registered"], true);
        assert_eq!(body["data"]["profile"], "08123456789");

        let (_, body) = send(&router, "POST", &uri, recording()).await;
        let transcript = body["data"]["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0]["role"], "Nasabah");
        assert_eq!(transcript[1]["message"], "Halo juga!");
        assert_eq!(body["data"]["speech"][0]["autoplay"], true);

        let (status, _) = send(&router, "DELETE", &format!("/api/sessions/{}", id), vec![]).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&router, "GET", &format!("/api/sessions/{}", id), vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (router, _) = router(&[], &[]);
        let uri = format!("/api/sessions/{}/audio", Uuid::new_v4());
        let (status, _) = send(&router, "POST", &uri, recording()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_garbage_upload_is_400() {
        let (router, _) = router(&[], &[]);
        let (_, body) = send(&router, "POST", "/api/sessions", vec![]).await;
        let id = body["data"]["session_id"].as_str().unwrap().to_string();

        let uri = format!("/api/sessions/{}/audio", id);
        let (status, body) = send(&router, "POST", &uri, b"webm bytes".to_vec()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Audio"));
    }
}
