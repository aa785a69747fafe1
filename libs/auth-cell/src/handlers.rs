use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::account::AccountService;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AccountService::new(&state);
    let user = service.register(request, Utc::now().naive_utc()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "user": user,
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&state);
    let outcome = service.login(request, Utc::now().naive_utc()).await?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": outcome.token,
        "token_type": "Bearer",
        "expires_in": service.session_ttl_seconds(),
        "user": outcome.user,
    })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    AccountService::new(&state).logout(auth.token()).await?;
    Ok(Json(json!({ "message": "Logout successful" })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    debug!("Fetching account for user {}", user.user_id);
    let view = AccountService::new(&state)
        .me(user.user_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({ "user": view })))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    AccountService::new(&state)
        .change_password(user.user_id, request)
        .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let view = AccountService::new(&state)
        .update_profile(user.user_id, request, Utc::now().naive_utc())
        .await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": view,
    })))
}
