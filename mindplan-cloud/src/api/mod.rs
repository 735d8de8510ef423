//! API routes for mindplan-cloud

pub mod billing;
pub mod health;
pub mod stripe_webhook;
pub mod subscription;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::error::AppError;
use tower_http::trace::TraceLayer;

use crate::auth::user_auth::user_auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Signed-in user endpoints (session JWT)
    let user = Router::new()
        .route("/api/subscription", get(subscription::get_subscription))
        .route("/api/billing/checkout", post(billing::create_checkout))
        .route("/api/billing/portal", post(billing::billing_portal))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route("/stripe/webhook", post(stripe_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .merge(user)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
