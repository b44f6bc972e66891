// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use medic_cell::models::TimeWindow;
use medic_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::models::{BookAppointmentRequest, Booking};
use crate::services::allocator::SlotAllocator;

pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    if user.role != Role::Patient {
        return Err(AppError::Forbidden("patient role required".to_string()));
    }
    debug!("Booking window {} for patient {}", request.window_id, user.id);

    let windows = AvailabilityService::new(&config);
    let window = windows.get_time_window(request.window_id).await?;

    let allocator = SlotAllocator::from_config(&config);
    let booking = allocator
        .allocate(&window, user.id, request.short_description, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// The caller's appointments over the coming week; patients see their
/// own reservations, medics see their windows' schedule.
pub async fn my_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let allocator = SlotAllocator::from_config(&config);
    let now = Utc::now();

    let bookings = match user.role {
        Role::Patient => allocator.upcoming_for_patient(user.id, now).await?,
        Role::Medic => {
            let windows = AvailabilityService::new(&config)
                .list_for_identity(user.id)
                .await?;
            let window_ids: Vec<Uuid> = windows.iter().map(|w| w.id).collect();
            allocator.upcoming_for_windows(&window_ids, now).await?
        }
        Role::None => {
            return Err(AppError::Forbidden("select a role first".to_string()));
        }
    };

    Ok(Json(bookings))
}

pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if user.role != Role::Patient {
        return Err(AppError::Forbidden("patient role required".to_string()));
    }

    let allocator = SlotAllocator::from_config(&config);
    allocator.cancel(booking_id, user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Public browse endpoint: a medic's windows that still have room in
/// their next occurrence.
pub async fn open_windows(
    State(config): State<Arc<AppConfig>>,
    Path(medic_id): Path<Uuid>,
) -> Result<Json<Vec<TimeWindow>>, AppError> {
    let windows = AvailabilityService::new(&config)
        .list_active_for_medic(medic_id)
        .await?;

    let allocator = SlotAllocator::from_config(&config);
    let open = allocator.open_windows(windows, Utc::now()).await?;

    Ok(Json(open))
}
