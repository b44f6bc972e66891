use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use auth_cell::AuthState;
use medic_cell::router::medic_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/auth", auth_routes(auth_state))
        .nest("/medics", medic_routes(config.clone()))
        .nest("/appointments", appointment_routes(config))
}
