use crate::config::BotSettings;
use crate::context::AppContext;
use crate::platform::{CodeRequest, SessionError};
use crate::status::status_message;
use crate::storage::{RunRecord, RunType, StorageError};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    fn new(status: &str, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginCodeRequest {
    pub code: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        tracing::error!(error = %e, "Storage error while handling request");
        ApiError::Internal(e.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Storage(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "detail": detail }))).into_response()
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic")],
                Json(serde_json::json!({ "detail": "Incorrect password" })),
            )
                .into_response(),
            ApiError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": detail })),
            )
                .into_response(),
        }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

pub async fn get_config(State(ctx): State<AppContext>) -> Result<Json<BotSettings>, ApiError> {
    let config = ctx.config.reload().await?;
    Ok(Json(config.settings.clone()))
}

pub async fn bulk_update_config(
    State(ctx): State<AppContext>,
    Json(settings): Json<BotSettings>,
) -> Result<Json<MessageResponse>, ApiError> {
    if settings.interval_minutes < 1 {
        return Err(ApiError::BadRequest(
            "interval_minutes must be at least 1".to_string(),
        ));
    }
    if settings.add_fee < 0 {
        return Err(ApiError::BadRequest("add_fee must not be negative".to_string()));
    }

    ctx.store.replace_config(&settings.to_entries()?).await?;
    ctx.config.reload().await?;

    tracing::info!(channels = settings.source_channels.len(), "Configuration updated");
    Ok(MessageResponse::new("success", "All settings updated"))
}

pub async fn get_status(State(ctx): State<AppContext>) -> Result<Json<MessageResponse>, ApiError> {
    let config = ctx.config.reload().await?;
    let last_run = ctx.store.last_run_by_type(RunType::Process).await?;

    let status = if config.settings.is_active {
        "active"
    } else {
        "inactive"
    };
    Ok(MessageResponse::new(
        status,
        status_message(&config.settings, last_run.as_ref()),
    ))
}

pub async fn get_history(State(ctx): State<AppContext>) -> Result<Json<Vec<RunRecord>>, ApiError> {
    Ok(Json(ctx.store.run_history(HISTORY_LIMIT).await?))
}

pub async fn reset(State(ctx): State<AppContext>) -> Result<Json<MessageResponse>, ApiError> {
    ctx.store.reset_except_config().await?;
    Ok(MessageResponse::new(
        "success",
        "Database reset (settings kept)",
    ))
}

/// Reached only past the auth middleware, so the credentials are valid.
pub async fn authenticate() -> Json<MessageResponse> {
    MessageResponse::new("success", "Authentication successful")
}

pub async fn bot_status(State(ctx): State<AppContext>) -> Json<MessageResponse> {
    if ctx.login.is_logged_in().await {
        MessageResponse::new("logged_in", "Bot is logged in")
    } else {
        MessageResponse::new("not_logged", "Bot is not logged in")
    }
}

pub async fn request_login_code(
    State(ctx): State<AppContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    match ctx.login.request_code().await? {
        CodeRequest::Sent => Ok(MessageResponse::new("pending", "Login code sent to your phone")),
        CodeRequest::AlreadyLoggedIn => Ok(MessageResponse::new("success", "Bot is already logged in")),
    }
}

pub async fn submit_login_code(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginCodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.login.submit_code(request.code.trim()).await?;
    Ok(MessageResponse::new("success", "Bot logged in successfully"))
}
