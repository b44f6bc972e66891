// libs/appointment-cell/src/services/ledger.rs
//
// The authoritative store of confirmed bookings. Uniqueness of
// (window, occurrence, ordinal) and interval collision are enforced at
// insert time; a violation is the Conflict the allocator retries on.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::RestClient;

use crate::models::{Booking, BookingError, NewBooking};

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Number of confirmed bookings for one occurrence of a window.
    async fn count_for_occurrence(
        &self,
        window_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64, BookingError>;

    /// Whether any booking on the window overlaps `[start, end)`.
    async fn has_overlap(
        &self,
        window_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, BookingError>;

    /// Persist a booking. Must be atomic: a concurrent insert that
    /// already claimed the ordinal or the interval yields
    /// `BookingError::Conflict`, never a silent overwrite.
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError>;

    async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError>;

    async fn upcoming_for_patient(
        &self,
        patient_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError>;

    async fn upcoming_for_windows(
        &self,
        window_ids: &[Uuid],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// Cancellation. Sibling ordinals keep their positions; the gap is
    /// tolerated, not backfilled.
    async fn remove(&self, booking_id: Uuid) -> Result<(), BookingError>;
}

// ==============================================================================
// DATA-API BACKED LEDGER
// ==============================================================================

pub struct RestLedger {
    db: RestClient,
}

impl RestLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: RestClient::new(config),
        }
    }

    fn encode_ts(ts: DateTime<Utc>) -> String {
        urlencoding::encode(&ts.to_rfc3339()).into_owned()
    }
}

#[async_trait]
impl BookingLedger for RestLedger {
    async fn count_for_occurrence(
        &self,
        window_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64, BookingError> {
        let path = format!(
            "/rest/v1/bookings?window_id=eq.{}&occurrence_date=eq.{}&select=id",
            window_id, date
        );
        let rows: Vec<Value> = self.db.request(Method::GET, &path, None).await?;

        Ok(rows.len() as i64)
    }

    async fn has_overlap(
        &self,
        window_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let path = format!(
            "/rest/v1/bookings?window_id=eq.{}&and=(start_at.lt.{},end_at.gt.{})&select=id",
            window_id,
            Self::encode_ts(end),
            Self::encode_ts(start),
        );
        let rows: Vec<Value> = self.db.request(Method::GET, &path, None).await?;

        Ok(!rows.is_empty())
    }

    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        debug!(
            "Inserting booking for window {} ordinal {}",
            booking.window_id, booking.ordinal
        );

        let stored: Booking = self
            .db
            .insert_returning("/rest/v1/bookings", json!(booking))
            .await?;

        Ok(stored)
    }

    async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let rows: Vec<Booking> = self.db.request(Method::GET, &path, None).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| BookingError::NotFound("booking not found".to_string()))
    }

    async fn upcoming_for_patient(
        &self,
        patient_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let path = format!(
            "/rest/v1/bookings?patient_id=eq.{}&and=(start_at.gt.{},start_at.lt.{})&order=start_at.asc",
            patient_id,
            Self::encode_ts(from),
            Self::encode_ts(until),
        );
        let rows: Vec<Booking> = self.db.request(Method::GET, &path, None).await?;

        Ok(rows)
    }

    async fn upcoming_for_windows(
        &self,
        window_ids: &[Uuid],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        if window_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = window_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/bookings?window_id=in.({})&and=(start_at.gt.{},start_at.lt.{})&order=start_at.asc",
            ids,
            Self::encode_ts(from),
            Self::encode_ts(until),
        );
        let rows: Vec<Booking> = self.db.request(Method::GET, &path, None).await?;

        Ok(rows)
    }

    async fn remove(&self, booking_id: Uuid) -> Result<(), BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let _: Vec<Value> = self.db.request(Method::DELETE, &path, None).await?;

        Ok(())
    }
}

// ==============================================================================
// IN-PROCESS LEDGER
// ==============================================================================

/// Mutex-serialized ledger holding bookings in memory. The insert path
/// runs the same uniqueness and overlap checks a relational constraint
/// would, under a single lock, so allocator behavior is identical to
/// the data-API backend.
pub struct MemoryLedger {
    bookings: Mutex<Vec<Booking>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            bookings: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingLedger for MemoryLedger {
    async fn count_for_occurrence(
        &self,
        window_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64, BookingError> {
        let bookings = self.bookings.lock().unwrap();
        Ok(bookings
            .iter()
            .filter(|b| b.window_id == window_id && b.occurrence_date == date)
            .count() as i64)
    }

    async fn has_overlap(
        &self,
        window_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let bookings = self.bookings.lock().unwrap();
        Ok(bookings
            .iter()
            .any(|b| b.window_id == window_id && b.start_at < end && b.end_at > start))
    }

    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let mut bookings = self.bookings.lock().unwrap();

        let ordinal_taken = bookings.iter().any(|b| {
            b.window_id == booking.window_id
                && b.occurrence_date == booking.occurrence_date
                && b.ordinal == booking.ordinal
        });
        let interval_taken = bookings.iter().any(|b| {
            b.window_id == booking.window_id
                && b.start_at < booking.end_at
                && b.end_at > booking.start_at
        });
        if ordinal_taken || interval_taken {
            return Err(BookingError::Conflict);
        }

        let stored = Booking {
            id: Uuid::new_v4(),
            window_id: booking.window_id,
            patient_id: booking.patient_id,
            occurrence_date: booking.occurrence_date,
            ordinal: booking.ordinal,
            start_at: booking.start_at,
            end_at: booking.end_at,
            duration_minutes: booking.duration_minutes,
            short_description: booking.short_description,
            medical_record_id: booking.medical_record_id,
            prescription_id: booking.prescription_id,
        };
        bookings.push(stored.clone());

        Ok(stored)
    }

    async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let bookings = self.bookings.lock().unwrap();
        bookings
            .iter()
            .find(|b| b.id == booking_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound("booking not found".to_string()))
    }

    async fn upcoming_for_patient(
        &self,
        patient_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().unwrap();
        let mut upcoming: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.patient_id == patient_id && b.start_at > from && b.start_at < until)
            .cloned()
            .collect();
        upcoming.sort_by_key(|b| b.start_at);

        Ok(upcoming)
    }

    async fn upcoming_for_windows(
        &self,
        window_ids: &[Uuid],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().unwrap();
        let mut upcoming: Vec<Booking> = bookings
            .iter()
            .filter(|b| {
                window_ids.contains(&b.window_id) && b.start_at > from && b.start_at < until
            })
            .cloned()
            .collect();
        upcoming.sort_by_key(|b| b.start_at);

        Ok(upcoming)
    }

    async fn remove(&self, booking_id: Uuid) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().unwrap();
        bookings.retain(|b| b.id != booking_id);

        Ok(())
    }
}
