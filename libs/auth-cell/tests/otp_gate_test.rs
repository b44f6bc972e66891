// libs/auth-cell/tests/otp_gate_test.rs
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;

use auth_cell::models::AuthError;
use auth_cell::services::identity::{IdentityStore, MemoryIdentityStore};
use auth_cell::services::notifier::Notifier;
use auth_cell::services::otp::OtpGate;
use shared_database::{EphemeralStore, MemoryStore};
use shared_models::auth::Role;
use shared_utils::jwt::validate_token;

const JWT_SECRET: &str = "otp-test-secret";
const PHONE: &str = "5550001";

// ==============================================================================
// FIXTURES
// ==============================================================================

struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    fn sent_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone_number: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((phone_number.to_string(), message.to_string()));
    }
}

struct TestSetup {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    identities: Arc<MemoryIdentityStore>,
    gate: OtpGate,
}

impl TestSetup {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let identities = Arc::new(MemoryIdentityStore::new());
        let gate = OtpGate::new(
            store.clone(),
            notifier.clone(),
            identities.clone(),
            JWT_SECRET.to_string(),
        );

        Self {
            store,
            notifier,
            identities,
            gate,
        }
    }

    /// The code the gate stored for a phone. Tests read it from the
    /// store because the gate never returns it to callers.
    async fn issued_code(&self, phone: &str) -> String {
        self.store
            .fetch(&format!("otp:{}", phone))
            .await
            .unwrap()
            .expect("no challenge stored")
    }

    async fn failure_count(&self, phone: &str) -> Option<String> {
        self.store
            .fetch(&format!("otp_failures:{}", phone))
            .await
            .unwrap()
    }
}

// ==============================================================================
// ISSUANCE
// ==============================================================================

#[tokio::test]
async fn issue_dispatches_exactly_one_code() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();

    assert_eq!(setup.notifier.sent_count(), 1);
    let code = setup.issued_code(PHONE).await;
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn reissue_while_pending_is_rejected() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let result = setup.gate.issue(PHONE).await;

    assert_matches!(result, Err(AuthError::AlreadyPending));
    // The rejected attempt sent nothing.
    assert_eq!(setup.notifier.sent_count(), 1);
}

#[tokio::test]
async fn reissue_is_allowed_after_challenge_expiry() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    setup.store.advance(121);

    setup.gate.issue(PHONE).await.unwrap();
    assert_eq!(setup.notifier.sent_count(), 2);
}

// ==============================================================================
// VERIFICATION
// ==============================================================================

#[tokio::test]
async fn verify_mints_tokens_and_creates_the_identity() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    let (tokens, created) = setup.gate.verify(PHONE, &code).await.unwrap();
    assert!(created);

    let user = validate_token(&tokens.access_token, JWT_SECRET).unwrap();
    assert_eq!(user.phone_number, PHONE);
    assert_eq!(user.role, Role::None);
}

#[tokio::test]
async fn verify_for_a_known_phone_reports_not_created() {
    let setup = TestSetup::new();
    setup.identities.get_or_create(PHONE).await.unwrap();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    let (_, created) = setup.gate.verify(PHONE, &code).await.unwrap();
    assert!(!created);
}

#[tokio::test]
async fn verify_consumes_the_challenge() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    setup.gate.verify(PHONE, &code).await.unwrap();

    // Replaying the same code finds no challenge.
    let result = setup.gate.verify(PHONE, &code).await;
    assert_matches!(result, Err(AuthError::InvalidCode));
}

#[tokio::test]
async fn wrong_code_increments_the_failure_counter() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();

    let result = setup.gate.verify(PHONE, "000000").await;
    assert_matches!(result, Err(AuthError::InvalidCode));
    assert_eq!(setup.failure_count(PHONE).await.as_deref(), Some("1"));

    let result = setup.gate.verify(PHONE, "111111").await;
    assert_matches!(result, Err(AuthError::InvalidCode));
    assert_eq!(setup.failure_count(PHONE).await.as_deref(), Some("2"));
}

#[tokio::test]
async fn success_clears_the_failure_counter() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    setup.gate.verify(PHONE, "000000").await.unwrap_err();
    setup.gate.verify(PHONE, "999999").await.unwrap_err();
    setup.gate.verify(PHONE, &code).await.unwrap();

    assert_eq!(setup.failure_count(PHONE).await, None);
}

#[tokio::test]
async fn expired_challenge_rejects_even_the_right_code() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    setup.store.advance(121);

    let result = setup.gate.verify(PHONE, &code).await;
    assert_matches!(result, Err(AuthError::InvalidCode));
    // Expiry behaves like any miss: the failure counter moves.
    assert_eq!(setup.failure_count(PHONE).await.as_deref(), Some("1"));
}

// ==============================================================================
// LOCKOUT
// ==============================================================================

#[tokio::test]
async fn fifth_failure_locks_out_even_the_correct_code() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;

    for _ in 0..5 {
        let result = setup.gate.verify(PHONE, "000000").await;
        assert_matches!(result, Err(AuthError::InvalidCode));
    }

    let result = setup.gate.verify(PHONE, &code).await;
    assert_matches!(result, Err(AuthError::LockedOut));
}

#[tokio::test]
async fn lockout_is_scoped_to_the_phone_number() {
    let setup = TestSetup::new();
    let other = "5550002";

    setup.gate.issue(PHONE).await.unwrap();
    for _ in 0..5 {
        setup.gate.verify(PHONE, "000000").await.unwrap_err();
    }

    setup.gate.issue(other).await.unwrap();
    let code = setup.issued_code(other).await;
    assert!(setup.gate.verify(other, &code).await.is_ok());
}

#[tokio::test]
async fn lockout_lifts_when_the_failure_counter_expires() {
    let setup = TestSetup::new();

    setup.gate.issue(PHONE).await.unwrap();
    for _ in 0..5 {
        setup.gate.verify(PHONE, "000000").await.unwrap_err();
    }
    assert_matches!(
        setup.gate.verify(PHONE, "000000").await,
        Err(AuthError::LockedOut)
    );

    // Counter TTL runs out; the old challenge is long gone too.
    setup.store.advance(301);

    setup.gate.issue(PHONE).await.unwrap();
    let code = setup.issued_code(PHONE).await;
    assert!(setup.gate.verify(PHONE, &code).await.is_ok());
}

// ==============================================================================
// ROLE SELECTION
// ==============================================================================

#[tokio::test]
async fn role_selection_requires_a_profile_and_reissues_tokens() {
    let setup = TestSetup::new();
    let (identity, _) = setup.identities.get_or_create(PHONE).await.unwrap();

    let result = setup.gate.select_role(identity.id, Role::Medic).await;
    assert_matches!(result, Err(AuthError::RoleUnavailable(_)));

    setup.identities.add_medic_profile(identity.id);
    let (updated, tokens) = setup.gate.select_role(identity.id, Role::Medic).await.unwrap();
    assert_eq!(updated.role, Role::Medic);

    let user = validate_token(&tokens.access_token, JWT_SECRET).unwrap();
    assert_eq!(user.role, Role::Medic);
}

#[tokio::test]
async fn roles_are_mutually_exclusive() {
    let setup = TestSetup::new();
    let (identity, _) = setup.identities.get_or_create(PHONE).await.unwrap();
    setup.identities.add_medic_profile(identity.id);
    setup.identities.add_patient_profile(identity.id);

    let (as_medic, _) = setup.gate.select_role(identity.id, Role::Medic).await.unwrap();
    assert_eq!(as_medic.role, Role::Medic);

    let (as_patient, _) = setup
        .gate
        .select_role(identity.id, Role::Patient)
        .await
        .unwrap();
    assert_eq!(as_patient.role, Role::Patient);
}
