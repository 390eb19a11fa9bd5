//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use common::database;
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    models::{CredentialsRequest, RefreshRequest, TokenBundle},
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    let (status, label) = if database_ok {
        (StatusCode::OK, "ok")
    } else {
        warn!("Health check failed: database unreachable");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "service": "auth-service",
            "database": database_ok,
        })),
    )
}

/// Account registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<TokenBundle>, AuthError> {
    info!("Registration attempt by {}", identifier_kind(&payload));

    let bundle = state.auth_service.register(payload).await?;
    Ok(Json(bundle))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<TokenBundle>, AuthError> {
    info!("Login attempt by {}", identifier_kind(&payload));

    let bundle = state.auth_service.login(payload).await?;
    Ok(Json(bundle))
}

/// Refresh token endpoint
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenBundle>, AuthError> {
    let bundle = state.auth_service.refresh(payload).await?;
    Ok(Json(bundle))
}

/// Which identifier a request uses, never the identifier itself
fn identifier_kind(payload: &CredentialsRequest) -> &'static str {
    match (payload.email(), payload.username()) {
        (Some(_), _) => "email",
        (None, Some(_)) => "username",
        (None, None) => "no identifier",
    }
}
