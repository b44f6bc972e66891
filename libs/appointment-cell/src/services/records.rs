// libs/appointment-cell/src/services/records.rs
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, RestClient};

use crate::models::{BookingError, MedicalRecord, Prescription};

/// Side entities attached to every booking: the shared clinical record
/// for the (medic, patient) pair and a fresh empty prescription.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent per (medic, patient): repeated calls return the same
    /// record.
    async fn get_or_create_record(
        &self,
        medic_id: Uuid,
        patient_id: Uuid,
    ) -> Result<MedicalRecord, BookingError>;

    async fn create_prescription(&self) -> Result<Prescription, BookingError>;
}

pub struct RestRecordStore {
    db: RestClient,
}

impl RestRecordStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: RestClient::new(config),
        }
    }

    async fn find_record(
        &self,
        medic_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<MedicalRecord>, BookingError> {
        let path = format!(
            "/rest/v1/medical_records?medic_id=eq.{}&patient_id=eq.{}",
            medic_id, patient_id
        );
        let rows: Vec<MedicalRecord> = self.db.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn get_or_create_record(
        &self,
        medic_id: Uuid,
        patient_id: Uuid,
    ) -> Result<MedicalRecord, BookingError> {
        if let Some(record) = self.find_record(medic_id, patient_id).await? {
            return Ok(record);
        }

        let record_data = json!({
            "medic_id": medic_id,
            "patient_id": patient_id,
            "hospitalized": false,
        });

        match self
            .db
            .insert_returning::<MedicalRecord>("/rest/v1/medical_records", record_data)
            .await
        {
            Ok(record) => {
                debug!("Created medical record {} for medic {}", record.id, medic_id);
                Ok(record)
            }
            // A concurrent booking for the same pair won the insert;
            // the unique constraint makes the re-read authoritative.
            Err(DbError::Conflict(_)) => self
                .find_record(medic_id, patient_id)
                .await?
                .ok_or_else(|| BookingError::NotFound("medical record not found".to_string())),
            Err(other) => Err(other.into()),
        }
    }

    async fn create_prescription(&self) -> Result<Prescription, BookingError> {
        let prescription_data = json!({
            "prescription_number": format!("RX-{}", Uuid::new_v4().simple()),
            "drugs": "",
        });

        let prescription: Prescription = self
            .db
            .insert_returning("/rest/v1/prescriptions", prescription_data)
            .await?;

        Ok(prescription)
    }
}

/// In-process record store mirroring the data-API semantics.
pub struct MemoryRecordStore {
    records: Mutex<Vec<MedicalRecord>>,
    prescriptions: Mutex<Vec<Prescription>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            prescriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn prescription_count(&self) -> usize {
        self.prescriptions.lock().unwrap().len()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_or_create_record(
        &self,
        medic_id: Uuid,
        patient_id: Uuid,
    ) -> Result<MedicalRecord, BookingError> {
        let mut records = self.records.lock().unwrap();

        if let Some(record) = records
            .iter()
            .find(|r| r.medic_id == medic_id && r.patient_id == patient_id)
        {
            return Ok(record.clone());
        }

        let record = MedicalRecord {
            id: Uuid::new_v4(),
            medic_id,
            patient_id,
            illness_subject: None,
            illness: None,
            hospitalized: false,
        };
        records.push(record.clone());

        Ok(record)
    }

    async fn create_prescription(&self) -> Result<Prescription, BookingError> {
        let prescription = Prescription {
            id: Uuid::new_v4(),
            prescription_number: format!("RX-{}", Uuid::new_v4().simple()),
            drugs: String::new(),
        };
        self.prescriptions.lock().unwrap().push(prescription.clone());

        Ok(prescription)
    }
}
