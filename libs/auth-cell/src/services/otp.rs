// libs/auth-cell/src/services/otp.rs
//
// Phone verification gate. One live challenge per phone number, a
// failure counter with its own longer TTL, lockout at five misses.
// The split TTLs let a fresh code be retried without inheriting stale
// failure history while still rate-limiting brute force in a rolling
// window.
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::EphemeralStore;
use shared_models::auth::{Role, TokenPair};
use shared_utils::jwt::issue_token_pair;

use crate::models::{AuthError, Identity};
use crate::services::identity::IdentityStore;
use crate::services::notifier::Notifier;

const CHALLENGE_TTL_SECONDS: u64 = 120;
const FAILURE_TTL_SECONDS: u64 = 300;
const MAX_FAILED_ATTEMPTS: i64 = 5;

pub struct OtpGate {
    store: Arc<dyn EphemeralStore>,
    notifier: Arc<dyn Notifier>,
    identities: Arc<dyn IdentityStore>,
    jwt_secret: String,
}

impl OtpGate {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        notifier: Arc<dyn Notifier>,
        identities: Arc<dyn IdentityStore>,
        jwt_secret: String,
    ) -> Self {
        Self {
            store,
            notifier,
            identities,
            jwt_secret,
        }
    }

    fn challenge_key(phone_number: &str) -> String {
        format!("otp:{}", phone_number)
    }

    fn failure_key(phone_number: &str) -> String {
        format!("otp_failures:{}", phone_number)
    }

    /// Issue a challenge for the phone number and hand the code to the
    /// notifier. The code never travels back to the caller. Rejected
    /// while a previous challenge is still live.
    pub async fn issue(&self, phone_number: &str) -> Result<(), AuthError> {
        let code = generate_code();

        let stored = self
            .store
            .put_if_absent(&Self::challenge_key(phone_number), &code, CHALLENGE_TTL_SECONDS)
            .await?;
        if !stored {
            debug!("Challenge already pending for {}", phone_number);
            return Err(AuthError::AlreadyPending);
        }

        self.notifier
            .send(phone_number, &format!("Your verification code is {}", code))
            .await;

        info!("OTP challenge issued for {}", phone_number);
        Ok(())
    }

    /// Verify a submitted code. Lockout is checked before anything
    /// else, so even a correct code is refused while locked. A miss
    /// (wrong code or no live challenge) bumps the failure counter and
    /// refreshes its TTL; a hit consumes the challenge, clears the
    /// counter, and signs tokens for the (possibly new) identity.
    pub async fn verify(
        &self,
        phone_number: &str,
        code: &str,
    ) -> Result<(TokenPair, bool), AuthError> {
        let failure_key = Self::failure_key(phone_number);

        let failures = self
            .store
            .fetch(&failure_key)
            .await?
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);
        if failures >= MAX_FAILED_ATTEMPTS {
            debug!("Phone {} is locked out ({} failures)", phone_number, failures);
            return Err(AuthError::LockedOut);
        }

        let challenge_key = Self::challenge_key(phone_number);
        let expected = self.store.fetch(&challenge_key).await?;

        match expected {
            Some(expected) if expected == code => {
                self.store.remove(&challenge_key).await?;
                self.store.remove(&failure_key).await?;

                let (identity, created) = self.identities.get_or_create(phone_number).await?;
                let tokens = issue_token_pair(
                    identity.id,
                    phone_number,
                    identity.role,
                    &self.jwt_secret,
                )
                .map_err(AuthError::Token)?;

                info!(
                    "OTP verified for {} (identity {}, created: {})",
                    phone_number, identity.id, created
                );
                Ok((tokens, created))
            }
            _ => {
                let count = self
                    .store
                    .increment(&failure_key, FAILURE_TTL_SECONDS)
                    .await?;
                debug!("OTP mismatch for {} (failure {})", phone_number, count);
                Err(AuthError::InvalidCode)
            }
        }
    }

    /// Switch the caller's mode and sign a token pair carrying the new
    /// role.
    pub async fn select_role(
        &self,
        identity_id: Uuid,
        role: Role,
    ) -> Result<(Identity, TokenPair), AuthError> {
        let identity = self.identities.select_role(identity_id, role).await?;
        let tokens = issue_token_pair(
            identity.id,
            &identity.phone_number,
            identity.role,
            &self.jwt_secret,
        )
        .map_err(AuthError::Token)?;

        info!("Identity {} switched to role {}", identity.id, identity.role);
        Ok((identity, tokens))
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
