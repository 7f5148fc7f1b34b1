use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            CredentialsRequest, ForgotPasswordRequest, ForgotPasswordResponse, MessageResponse,
            ResetPasswordRequest,
        },
        error::AuthResult,
        reset::ResetTokenManager,
        services::CredentialManager,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AuthResult<(StatusCode, Json<MessageResponse>)> {
    let creds = CredentialManager::from_ref(&state);
    creds
        .create_account(&payload.email, &payload.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AuthResult<Json<MessageResponse>> {
    let creds = CredentialManager::from_ref(&state);
    creds.authenticate(&payload.email, &payload.password).await?;
    Ok(Json(MessageResponse::new("Login successful")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<ForgotPasswordResponse>> {
    let reset = ResetTokenManager::from_ref(&state);
    let issued = reset.issue_reset_token(&payload.email).await?;

    // no mailer: the link goes back in the response
    let reset_link = format!("{}/{}", state.config.auth.reset_link_base, issued.token);
    info!(user_id = %issued.user_id, expires_at = %issued.expires_at, "reset link generated");
    Ok(Json(ForgotPasswordResponse {
        message: "Password reset link has been sent to your email".into(),
        reset_link,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>> {
    let reset = ResetTokenManager::from_ref(&state);
    reset
        .consume_reset_token(&payload.token, &payload.password)
        .await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully",
    )))
}
