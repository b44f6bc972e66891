// libs/appointment-cell/src/services/allocator.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use medic_cell::models::TimeWindow;
use shared_config::AppConfig;

use crate::models::{Booking, BookingError, NewBooking};
use crate::services::ledger::{BookingLedger, RestLedger};
use crate::services::records::{RecordStore, RestRecordStore};

const UPCOMING_HORIZON_DAYS: i64 = 7;

/// Turns a recurring window into concrete reservations: next
/// occurrence date, ordinal within it, and the exact start timestamp.
pub struct SlotAllocator {
    ledger: Arc<dyn BookingLedger>,
    records: Arc<dyn RecordStore>,
}

impl SlotAllocator {
    pub fn new(ledger: Arc<dyn BookingLedger>, records: Arc<dyn RecordStore>) -> Self {
        Self { ledger, records }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(RestLedger::new(config)),
            Arc::new(RestRecordStore::new(config)),
        )
    }

    /// Next concrete date of the window's weekday, strictly after
    /// `now`'s date. When today already is that weekday the occurrence
    /// moves a full week out: today's slots may have started already,
    /// and the skip doubles as the minimum lead time.
    pub fn next_occurrence(day_of_week: u8, now: DateTime<Utc>) -> NaiveDate {
        let mut day_offset =
            day_of_week as i64 - now.weekday().num_days_from_monday() as i64;
        if day_offset <= 0 {
            day_offset += 7;
        }

        now.date_naive() + Duration::days(day_offset)
    }

    /// Reserve the next free slot of `window` for a patient.
    ///
    /// Ordinals are claimed strictly in arrival order of the count
    /// snapshot; a concurrent allocation that lands on the same ordinal
    /// between the snapshot and the insert surfaces as `Conflict`, and
    /// the caller retries from fresh reads.
    pub async fn allocate(
        &self,
        window: &TimeWindow,
        patient_id: Uuid,
        short_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if !window.active {
            return Err(BookingError::InactiveWindow);
        }

        let occurrence_date = Self::next_occurrence(window.day_of_week, now);

        let reserved = self
            .ledger
            .count_for_occurrence(window.id, occurrence_date)
            .await?;
        if reserved >= window.capacity as i64 {
            debug!(
                "Window {} occurrence {} is fully booked ({}/{})",
                window.id, occurrence_date, reserved, window.capacity
            );
            return Err(BookingError::FullyBooked);
        }

        let ordinal = (reserved + 1) as i32;
        let start_at = occurrence_date.and_time(window.start_time).and_utc()
            + Duration::minutes(reserved * window.avg_visit_minutes as i64);
        let end_at = start_at + window.visit_duration();

        if self.ledger.has_overlap(window.id, start_at, end_at).await? {
            debug!(
                "Window {} slot at {} already taken, rejecting",
                window.id, start_at
            );
            return Err(BookingError::Conflict);
        }

        let record = self
            .records
            .get_or_create_record(window.medic_id, patient_id)
            .await?;
        let prescription = self.records.create_prescription().await?;

        let booking = self
            .ledger
            .insert(NewBooking {
                window_id: window.id,
                patient_id,
                occurrence_date,
                ordinal,
                start_at,
                end_at,
                duration_minutes: window.avg_visit_minutes,
                short_description,
                medical_record_id: Some(record.id),
                prescription_id: Some(prescription.id),
            })
            .await?;

        info!(
            "Booked appointment {} for patient {}: window {} on {} as #{}",
            booking.id, patient_id, window.id, occurrence_date, ordinal
        );
        Ok(booking)
    }

    /// Active windows whose next occurrence still has room.
    pub async fn open_windows(
        &self,
        windows: Vec<TimeWindow>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeWindow>, BookingError> {
        let mut open = Vec::new();

        for window in windows {
            if !window.active {
                continue;
            }

            let occurrence_date = Self::next_occurrence(window.day_of_week, now);
            let reserved = self
                .ledger
                .count_for_occurrence(window.id, occurrence_date)
                .await?;

            if reserved < window.capacity as i64 {
                open.push(window);
            }
        }

        Ok(open)
    }

    /// The patient's confirmed bookings over the coming week.
    pub async fn upcoming_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.ledger
            .upcoming_for_patient(patient_id, now, now + Duration::days(UPCOMING_HORIZON_DAYS))
            .await
    }

    /// Bookings over the coming week across a medic's windows.
    pub async fn upcoming_for_windows(
        &self,
        window_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.ledger
            .upcoming_for_windows(window_ids, now, now + Duration::days(UPCOMING_HORIZON_DAYS))
            .await
    }

    /// Cancel a booking the patient owns. Sibling ordinals are left as
    /// they are.
    pub async fn cancel(&self, booking_id: Uuid, patient_id: Uuid) -> Result<(), BookingError> {
        let booking = self.ledger.get(booking_id).await?;

        if booking.patient_id != patient_id {
            return Err(BookingError::NotFound("booking not found".to_string()));
        }

        self.ledger.remove(booking_id).await?;
        info!("Cancelled booking {} for patient {}", booking_id, patient_id);

        Ok(())
    }
}
