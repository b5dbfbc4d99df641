use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_runtime::ConversationEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::types::*;

const MAX_TEXT_LENGTH: usize = 50_000; // 50KB
const DEFAULT_LANGUAGE: &str = "en";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(engine: Arc<ConversationEngine>) -> Self {
        Self {
            engine,
            allowed_origins: Vec::new(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = if state.allowed_origins.is_empty() {
        // Permissive for development
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/conversation", post(converse))
        .route("/api/v1/conversation/{id}", get(conversation_info))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the gateway server
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!(addr = %addr, "Starting gateway server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// --- REST Handlers ---

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.engine.provider().model_name().to_string(),
    })
}

async fn converse(
    State(state): State<AppState>,
    Json(req): Json<ConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    if req.text.len() > MAX_TEXT_LENGTH {
        return Err(api_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Text exceeds maximum length of {} bytes", MAX_TEXT_LENGTH),
        ));
    }
    if req.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Text must not be empty"));
    }

    let language = req.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
    let outcome = state
        .engine
        .process(req.conversation_id.as_deref(), &req.text, language)
        .await;

    Ok(Json(ConversationResponse {
        speech: outcome.speech,
        conversation_id: outcome.session_id,
    }))
}

async fn conversation_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationInfo>, ApiError> {
    match state.engine.session_info(&id) {
        Some(info) => Ok(Json(ConversationInfo {
            conversation_id: id,
            message_count: info.message_count,
            busy: info.busy,
        })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Conversation not found: {}", id),
        )),
    }
}
