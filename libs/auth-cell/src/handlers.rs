// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    SelectRoleRequest, SelectRoleResponse, SendOtpRequest, VerifyOtpRequest, VerifyOtpResponse,
};
use crate::AuthState;

pub async fn send_otp(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("OTP requested for {}", request.phone_number);

    state.gate.issue(&request.phone_number).await?;

    Ok(Json(json!({ "message": "OTP sent successfully." })))
}

pub async fn verify_otp(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<VerifyOtpResponse>), AppError> {
    let (tokens, created) = state
        .gate
        .verify(&request.phone_number, &request.code)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(VerifyOtpResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            created,
        }),
    ))
}

/// Explicit role selection. A fresh token pair is returned because the
/// role is carried in the token claims.
pub async fn select_role(
    State(state): State<Arc<AuthState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SelectRoleRequest>,
) -> Result<Json<SelectRoleResponse>, AppError> {
    debug!("Identity {} selecting role {}", user.id, request.role);

    let (identity, tokens) = state.gate.select_role(user.id, request.role).await?;

    Ok(Json(SelectRoleResponse {
        identity,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}
