pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{EphemeralStore, MemoryStore, RedisStore};

use crate::models::AuthError;
use crate::services::identity::RestIdentityStore;
use crate::services::notifier::{NoopNotifier, Notifier, SmsNotifier};
use crate::services::otp::OtpGate;

/// Long-lived auth state: the ephemeral store behind the gate must
/// survive across requests, so it is built once at startup rather than
/// per call.
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub gate: OtpGate,
}

impl AuthState {
    pub async fn from_config(config: Arc<AppConfig>) -> Result<Self, AuthError> {
        let store: Arc<dyn EphemeralStore> = match config.redis_url.as_deref() {
            Some(url) if !url.is_empty() => Arc::new(RedisStore::new(url).await?),
            _ => Arc::new(MemoryStore::new()),
        };

        let notifier: Arc<dyn Notifier> = match config.sms_gateway_url.as_deref() {
            Some(url) if !url.is_empty() => Arc::new(SmsNotifier::new(url)),
            _ => Arc::new(NoopNotifier),
        };

        let identities = Arc::new(RestIdentityStore::new(&config));
        let gate = OtpGate::new(store, notifier, identities, config.jwt_secret.clone());

        Ok(Self { config, gate })
    }
}
