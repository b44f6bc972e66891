// libs/auth-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::post,
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AuthState;

pub fn auth_routes(state: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/send_otp", post(handlers::send_otp))
        .route("/verify_otp", post(handlers::verify_otp));

    let protected_routes = Router::new()
        .route("/role", post(handlers::select_role))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
