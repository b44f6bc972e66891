// libs/medic-cell/src/models.rs
use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// PROFILE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medic {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: String,
    pub medical_system_number: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub clinic_serial: String,
    pub accepted: bool,
}

// ==============================================================================
// AVAILABILITY WINDOW
// ==============================================================================

/// A medic's recurring weekly availability block at a clinic.
/// `day_of_week` is 0 = Monday through 6 = Sunday; a medic holds at
/// most one active window per weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    pub id: Uuid,
    pub medic_id: Uuid,
    pub clinic_id: Uuid,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub avg_visit_minutes: i32,
    pub capacity: i32,
    pub active: bool,
}

impl TimeWindow {
    /// Number of visits that fit in the window. Pure, and the single
    /// source of the stored `capacity` column: recomputed on every
    /// change of the time fields.
    pub fn derive_capacity(
        start_time: NaiveTime,
        end_time: NaiveTime,
        avg_visit_minutes: i32,
    ) -> Result<i32, WindowError> {
        if avg_visit_minutes <= 0 {
            return Err(WindowError::InvalidWindow(
                "average visit length must be positive".to_string(),
            ));
        }
        if start_time >= end_time {
            return Err(WindowError::InvalidWindow(
                "start time must be before end time".to_string(),
            ));
        }

        let total_minutes = (end_time - start_time).num_minutes();
        let capacity = (total_minutes / avg_visit_minutes as i64) as i32;

        if capacity == 0 {
            return Err(WindowError::InvalidWindow(
                "window is shorter than a single visit".to_string(),
            ));
        }

        Ok(capacity)
    }

    pub fn visit_duration(&self) -> Duration {
        Duration::minutes(self.avg_visit_minutes as i64)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimeWindowRequest {
    pub clinic_id: Uuid,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub avg_visit_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTimeWindowRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub avg_visit_minutes: Option<i32>,
    pub active: Option<bool>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum WindowError {
    #[error("Invalid availability window: {0}")]
    InvalidWindow(String),

    #[error("Policy violation: {0}")]
    Policy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for WindowError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(_) => {
                WindowError::Policy("an availability window already exists for this day".to_string())
            }
            DbError::NotFound(msg) => WindowError::NotFound(msg),
            other => WindowError::Database(other.to_string()),
        }
    }
}

impl From<WindowError> for AppError {
    fn from(err: WindowError) -> Self {
        match err {
            WindowError::InvalidWindow(msg) => AppError::ValidationError(msg),
            WindowError::Policy(msg) => AppError::Forbidden(msg),
            WindowError::NotFound(msg) => AppError::NotFound(msg),
            WindowError::Database(msg) => AppError::Database(msg),
        }
    }
}
