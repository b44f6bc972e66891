// libs/auth-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::auth::Role;
use shared_models::error::AppError;

/// The account behind a phone number. Created on first successful OTP
/// verification; the role is selected explicitly afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    #[serde(default)]
    pub role: Role,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRoleResponse {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("A verification code was already sent, try again later")]
    AlreadyPending,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Too many failed attempts, try again later")]
    LockedOut,

    #[error("Role unavailable: {0}")]
    RoleUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Store(msg) => AuthError::Store(msg),
            DbError::NotFound(msg) => AuthError::NotFound(msg),
            other => AuthError::Database(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AlreadyPending | AuthError::LockedOut => {
                AppError::Forbidden(err.to_string())
            }
            AuthError::InvalidCode => AppError::BadRequest(err.to_string()),
            AuthError::RoleUnavailable(msg) => AppError::Forbidden(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Store(msg) | AuthError::Database(msg) => AppError::Database(msg),
        }
    }
}
