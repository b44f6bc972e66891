// libs/medic-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::models::{CreateTimeWindowRequest, TimeWindow, UpdateTimeWindowRequest};
use crate::services::availability::AvailabilityService;

fn require_medic(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Medic {
        return Err(AppError::Forbidden("medic role required".to_string()));
    }
    Ok(())
}

pub async fn create_window(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateTimeWindowRequest>,
) -> Result<(StatusCode, Json<TimeWindow>), AppError> {
    require_medic(&user)?;
    debug!("Creating availability window for medic identity {}", user.id);

    let service = AvailabilityService::new(&config);
    let window = service.create_time_window(user.id, request).await?;

    Ok((StatusCode::CREATED, Json(window)))
}

pub async fn update_window(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(window_id): Path<Uuid>,
    Json(request): Json<UpdateTimeWindowRequest>,
) -> Result<Json<TimeWindow>, AppError> {
    require_medic(&user)?;

    let service = AvailabilityService::new(&config);
    let window = service.update_time_window(user.id, window_id, request).await?;

    Ok(Json(window))
}

pub async fn deactivate_window(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(window_id): Path<Uuid>,
) -> Result<Json<TimeWindow>, AppError> {
    require_medic(&user)?;

    let service = AvailabilityService::new(&config);
    let window = service.deactivate_time_window(user.id, window_id).await?;

    Ok(Json(window))
}

pub async fn list_my_windows(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<TimeWindow>>, AppError> {
    require_medic(&user)?;

    let service = AvailabilityService::new(&config);
    let windows = service.list_for_identity(user.id).await?;

    Ok(Json(windows))
}
