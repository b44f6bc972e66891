// libs/medic-cell/src/services/availability.rs
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::RestClient;

use crate::models::{
    Clinic, CreateTimeWindowRequest, Medic, TimeWindow, UpdateTimeWindowRequest, WindowError,
};

pub struct AvailabilityService {
    db: RestClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: RestClient::new(config),
        }
    }

    /// Create a recurring availability window for the calling medic.
    ///
    /// Policy: the medic and the clinic must both be accepted, and the
    /// medic may hold only one active window per weekday. The derived
    /// capacity is persisted with the row.
    pub async fn create_time_window(
        &self,
        identity_id: Uuid,
        request: CreateTimeWindowRequest,
    ) -> Result<TimeWindow, WindowError> {
        debug!("Creating time window for identity {}", identity_id);

        if request.day_of_week > 6 {
            return Err(WindowError::InvalidWindow(
                "day of week must be between 0 (Monday) and 6 (Sunday)".to_string(),
            ));
        }

        let capacity = TimeWindow::derive_capacity(
            request.start_time,
            request.end_time,
            request.avg_visit_minutes,
        )?;

        let medic = self.get_medic_by_identity(identity_id).await?;
        if !medic.accepted {
            return Err(WindowError::Policy("medic must be accepted first".to_string()));
        }

        let clinic = self.get_clinic(request.clinic_id).await?;
        if !clinic.accepted {
            return Err(WindowError::Policy("clinic must be accepted first".to_string()));
        }

        let existing_path = format!(
            "/rest/v1/time_windows?medic_id=eq.{}&day_of_week=eq.{}&active=eq.true",
            medic.id, request.day_of_week
        );
        let existing: Vec<Value> = self.db.request(Method::GET, &existing_path, None).await?;
        if !existing.is_empty() {
            return Err(WindowError::Policy(
                "an availability window already exists for this day".to_string(),
            ));
        }

        let window_data = json!({
            "medic_id": medic.id,
            "clinic_id": clinic.id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "avg_visit_minutes": request.avg_visit_minutes,
            "capacity": capacity,
            "active": true,
        });

        let window: TimeWindow = self
            .db
            .insert_returning("/rest/v1/time_windows", window_data)
            .await?;

        debug!("Time window {} created with capacity {}", window.id, window.capacity);
        Ok(window)
    }

    /// Update the time fields of a window. Capacity is recomputed from
    /// the merged values before anything is written.
    pub async fn update_time_window(
        &self,
        identity_id: Uuid,
        window_id: Uuid,
        request: UpdateTimeWindowRequest,
    ) -> Result<TimeWindow, WindowError> {
        debug!("Updating time window {}", window_id);

        let current = self.get_time_window(window_id).await?;
        self.check_ownership(identity_id, &current).await?;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let avg_visit_minutes = request.avg_visit_minutes.unwrap_or(current.avg_visit_minutes);

        let capacity = TimeWindow::derive_capacity(start_time, end_time, avg_visit_minutes)?;

        let mut update_data = serde_json::Map::new();
        if let Some(start) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start));
        }
        if let Some(end) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end));
        }
        if let Some(avg) = request.avg_visit_minutes {
            update_data.insert("avg_visit_minutes".to_string(), json!(avg));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
        }
        update_data.insert("capacity".to_string(), json!(capacity));

        self.patch_returning(window_id, Value::Object(update_data)).await
    }

    /// Windows referenced by bookings are deactivated, never deleted.
    pub async fn deactivate_time_window(
        &self,
        identity_id: Uuid,
        window_id: Uuid,
    ) -> Result<TimeWindow, WindowError> {
        debug!("Deactivating time window {}", window_id);

        let current = self.get_time_window(window_id).await?;
        self.check_ownership(identity_id, &current).await?;

        self.patch_returning(window_id, json!({ "active": false })).await
    }

    pub async fn get_time_window(&self, window_id: Uuid) -> Result<TimeWindow, WindowError> {
        let path = format!("/rest/v1/time_windows?id=eq.{}", window_id);
        let result: Vec<TimeWindow> = self.db.request(Method::GET, &path, None).await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| WindowError::NotFound("availability window not found".to_string()))
    }

    pub async fn list_for_identity(&self, identity_id: Uuid) -> Result<Vec<TimeWindow>, WindowError> {
        let medic = self.get_medic_by_identity(identity_id).await?;
        let path = format!(
            "/rest/v1/time_windows?medic_id=eq.{}&order=day_of_week.asc",
            medic.id
        );
        let windows: Vec<TimeWindow> = self.db.request(Method::GET, &path, None).await?;
        Ok(windows)
    }

    pub async fn list_active_for_medic(&self, medic_id: Uuid) -> Result<Vec<TimeWindow>, WindowError> {
        let path = format!(
            "/rest/v1/time_windows?medic_id=eq.{}&active=eq.true&order=day_of_week.asc",
            medic_id
        );
        let windows: Vec<TimeWindow> = self.db.request(Method::GET, &path, None).await?;
        Ok(windows)
    }

    // Private helpers

    async fn get_medic_by_identity(&self, identity_id: Uuid) -> Result<Medic, WindowError> {
        let path = format!("/rest/v1/medics?identity_id=eq.{}", identity_id);
        let result: Vec<Medic> = self.db.request(Method::GET, &path, None).await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| WindowError::NotFound("medic profile not found".to_string()))
    }

    async fn get_clinic(&self, clinic_id: Uuid) -> Result<Clinic, WindowError> {
        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let result: Vec<Clinic> = self.db.request(Method::GET, &path, None).await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| WindowError::NotFound("clinic not found".to_string()))
    }

    async fn check_ownership(
        &self,
        identity_id: Uuid,
        window: &TimeWindow,
    ) -> Result<(), WindowError> {
        let medic = self.get_medic_by_identity(identity_id).await?;
        if medic.id != window.medic_id {
            return Err(WindowError::Policy(
                "window belongs to another medic".to_string(),
            ));
        }
        Ok(())
    }

    async fn patch_returning(
        &self,
        window_id: Uuid,
        body: Value,
    ) -> Result<TimeWindow, WindowError> {
        let path = format!("/rest/v1/time_windows?id=eq.{}", window_id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<TimeWindow> = self
            .db
            .request_with_headers(Method::PATCH, &path, Some(body), Some(headers))
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| WindowError::NotFound("availability window not found".to_string()))
    }
}
