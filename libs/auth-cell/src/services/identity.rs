// libs/auth-cell/src/services/identity.rs
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, RestClient};
use shared_models::auth::Role;

use crate::models::{AuthError, Identity};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the identity for a phone number, creating it when
    /// absent. The boolean reports whether it was just created.
    async fn get_or_create(&self, phone_number: &str) -> Result<(Identity, bool), AuthError>;

    /// Switch the identity's mode. Medic and patient require the
    /// matching profile row; the previous role is always dropped.
    async fn select_role(&self, identity_id: Uuid, role: Role) -> Result<Identity, AuthError>;
}

// ==============================================================================
// DATA-API BACKED STORE
// ==============================================================================

pub struct RestIdentityStore {
    db: RestClient,
}

impl RestIdentityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: RestClient::new(config),
        }
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Identity>, AuthError> {
        let path = format!(
            "/rest/v1/identities?phone_number=eq.{}",
            urlencoding::encode(phone_number)
        );
        let rows: Vec<Identity> = self.db.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next())
    }

    async fn has_profile(&self, table: &str, identity_id: Uuid) -> Result<bool, AuthError> {
        let path = format!("/rest/v1/{}?identity_id=eq.{}&select=id", table, identity_id);
        let rows: Vec<Value> = self.db.request(Method::GET, &path, None).await?;

        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl IdentityStore for RestIdentityStore {
    async fn get_or_create(&self, phone_number: &str) -> Result<(Identity, bool), AuthError> {
        if let Some(identity) = self.find_by_phone(phone_number).await? {
            return Ok((identity, false));
        }

        let identity_data = json!({
            "phone_number": phone_number,
            "role": Role::None,
        });

        match self
            .db
            .insert_returning::<Identity>("/rest/v1/identities", identity_data)
            .await
        {
            Ok(identity) => {
                debug!("Created identity {} for new phone number", identity.id);
                Ok((identity, true))
            }
            // Lost a signup race on the unique phone number; the row
            // now exists.
            Err(DbError::Conflict(_)) => {
                let identity = self.find_by_phone(phone_number).await?.ok_or_else(|| {
                    AuthError::Database("identity vanished after conflict".to_string())
                })?;
                Ok((identity, false))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn select_role(&self, identity_id: Uuid, role: Role) -> Result<Identity, AuthError> {
        match role {
            Role::Medic => {
                if !self.has_profile("medics", identity_id).await? {
                    return Err(AuthError::RoleUnavailable(
                        "no medic profile for this identity".to_string(),
                    ));
                }
            }
            Role::Patient => {
                if !self.has_profile("patients", identity_id).await? {
                    return Err(AuthError::RoleUnavailable(
                        "no patient profile for this identity".to_string(),
                    ));
                }
            }
            Role::None => {}
        }

        let path = format!("/rest/v1/identities?id=eq.{}", identity_id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<Identity> = self
            .db
            .request_with_headers(Method::PATCH, &path, Some(json!({ "role": role })), Some(headers))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AuthError::NotFound("identity not found".to_string()))
    }
}

// ==============================================================================
// IN-PROCESS STORE
// ==============================================================================

/// Identity store backed by process memory, mirroring the data-API
/// semantics including profile-gated role selection.
pub struct MemoryIdentityStore {
    identities: Mutex<Vec<Identity>>,
    medic_profiles: Mutex<Vec<Uuid>>,
    patient_profiles: Mutex<Vec<Uuid>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            identities: Mutex::new(Vec::new()),
            medic_profiles: Mutex::new(Vec::new()),
            patient_profiles: Mutex::new(Vec::new()),
        }
    }

    pub fn add_medic_profile(&self, identity_id: Uuid) {
        self.medic_profiles.lock().unwrap().push(identity_id);
    }

    pub fn add_patient_profile(&self, identity_id: Uuid) {
        self.patient_profiles.lock().unwrap().push(identity_id);
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_or_create(&self, phone_number: &str) -> Result<(Identity, bool), AuthError> {
        let mut identities = self.identities.lock().unwrap();

        if let Some(identity) = identities.iter().find(|i| i.phone_number == phone_number) {
            return Ok((identity.clone(), false));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            phone_number: phone_number.to_string(),
            first_name: None,
            last_name: None,
            age: None,
            role: Role::None,
        };
        identities.push(identity.clone());

        Ok((identity, true))
    }

    async fn select_role(&self, identity_id: Uuid, role: Role) -> Result<Identity, AuthError> {
        match role {
            Role::Medic => {
                if !self.medic_profiles.lock().unwrap().contains(&identity_id) {
                    return Err(AuthError::RoleUnavailable(
                        "no medic profile for this identity".to_string(),
                    ));
                }
            }
            Role::Patient => {
                if !self.patient_profiles.lock().unwrap().contains(&identity_id) {
                    return Err(AuthError::RoleUnavailable(
                        "no patient profile for this identity".to_string(),
                    ));
                }
            }
            Role::None => {}
        }

        let mut identities = self.identities.lock().unwrap();
        let identity = identities
            .iter_mut()
            .find(|i| i.id == identity_id)
            .ok_or_else(|| AuthError::NotFound("identity not found".to_string()))?;

        identity.role = role;
        Ok(identity.clone())
    }
}
