//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ClearResponse, ConversationQuery, ConversationResponse,
    ErrorResponse, MessageView,
};
use super::AppState;
use crate::runtime::EngineError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/conversations", post(send_message).get(get_conversation))
        .route("/conversations/clear", post(clear_conversations))
        .with_state(state)
}

/// Caller identity, resolved from the `x-user-id` header the session layer
/// in front of this service injects.
pub struct OwnerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OwnerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| OwnerId(v.to_string()))
            .ok_or_else(|| AppError::Unauthorized("Missing user identity".to_string()))
    }
}

async fn send_message(
    State(state): State<AppState>,
    owner: OwnerId,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }

    let outcome = state
        .engine
        .handle_message(&owner.0, req.conversation_id.as_deref(), message)
        .await?;

    Ok(Json(ChatResponse {
        conversation_id: outcome.conversation_id,
        status: outcome.status,
        run_id: outcome.run_id,
    }))
}

async fn get_conversation(
    State(state): State<AppState>,
    owner: OwnerId,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation_id = query.conversation_id.ok_or_else(|| {
        AppError::BadRequest("Missing conversationId query parameter".to_string())
    })?;

    let view = state.engine.snapshot(&owner.0, &conversation_id).await?;

    Ok(Json(ConversationResponse {
        status: view.status.as_str().to_string(),
        messages: view.messages.into_iter().map(MessageView::from).collect(),
        leaflet_url: view.leaflet_url,
    }))
}

async fn clear_conversations(
    State(state): State<AppState>,
    owner: OwnerId,
) -> Result<Json<ClearResponse>, AppError> {
    let deleted = state.engine.clear_owner(&owner.0)?;
    tracing::info!(owner_id = %owner.0, deleted, "Cleared conversations");

    Ok(Json(ClearResponse {
        success: true,
        deleted,
    }))
}

// ============================================================
// Error Handling
// ============================================================

/// Application error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Rejected(msg) => AppError::BadRequest(msg),
            EngineError::NotFound(id) => {
                AppError::NotFound(format!("Conversation not found: {id}"))
            }
            EngineError::Infra(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "Request failed");
        }

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
