// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// A confirmed reservation inside one occurrence of a time window.
///
/// `ordinal` is the 1-based position within the occurrence; `start_at`
/// and `end_at` are fully derived from it at allocation time and are
/// never rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub window_id: Uuid,
    pub patient_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub ordinal: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub short_description: Option<String>,
    pub medical_record_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub window_id: Uuid,
    pub patient_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub ordinal: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub short_description: Option<String>,
    pub medical_record_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
}

// ==============================================================================
// SIDE ENTITIES
// ==============================================================================

/// Clinical history shared by one (medic, patient) pair. One row per
/// pair; bookings reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub medic_id: Uuid,
    pub patient_id: Uuid,
    pub illness_subject: Option<String>,
    pub illness: Option<String>,
    pub hospitalized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub prescription_number: String,
    pub drugs: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub window_id: Uuid,
    pub short_description: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Availability window is not active")]
    InactiveWindow,

    #[error("Appointment occurrence is fully booked")]
    FullyBooked,

    #[error("Booking conflicts with an existing reservation")]
    Conflict,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(_) => BookingError::Conflict,
            DbError::NotFound(msg) => BookingError::NotFound(msg),
            other => BookingError::Database(other.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InactiveWindow | BookingError::FullyBooked => {
                AppError::ValidationError(err.to_string())
            }
            BookingError::Conflict => AppError::Conflict(err.to_string()),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::Database(msg) => AppError::Database(msg),
        }
    }
}
