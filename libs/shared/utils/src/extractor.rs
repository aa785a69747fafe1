use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

use shared_models::auth::{AuthenticatedUser, Role};
use shared_models::error::AppError;

use crate::state::AppState;

const DEACTIVATED_MESSAGE: &str = "Your account has been deactivated. Please contact admin.";

// Middleware for authentication
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;
    let token = bearer.token().to_string();

    let session = state
        .sessions
        .lookup(&token)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;

    // Accounts can be deactivated or removed while a session is live.
    let is_active = state
        .store
        .read(|t| t.user(session.user_id).map(|u| u.is_active).ok())
        .await;

    match is_active {
        Some(true) => {}
        Some(false) => {
            state.sessions.revoke(&token).await?;
            return Err(AppError::Forbidden(DEACTIVATED_MESSAGE.to_string()));
        }
        None => {
            state.sessions.revoke(&token).await?;
            return Err(AppError::Auth("Invalid or expired session".to_string()));
        }
    }

    debug!("Authenticated user {} as {}", session.user_id, session.actor.role());

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: session.user_id,
        actor: session.actor,
    });

    Ok(next.run(request).await)
}

/// Rejects requests whose authenticated user does not hold `role`. Must be
/// layered inside `auth_middleware`.
pub async fn require_role(
    State(role): State<Role>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;

    if user.role() != role {
        let label = match role {
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Patient => "Patient",
        };
        return Err(AppError::Forbidden(format!("{} access required", label)));
    }

    Ok(next.run(request).await)
}

// Function to extract user from request extensions
pub fn extract_user<B>(request: &Request<B>) -> Result<AuthenticatedUser, AppError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}
