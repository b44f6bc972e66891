// libs/medic-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn medic_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/windows", post(handlers::create_window))
        .route("/windows", get(handlers::list_my_windows))
        .route("/windows/{window_id}", patch(handlers::update_window))
        .route("/windows/{window_id}", delete(handlers::deactivate_window))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
