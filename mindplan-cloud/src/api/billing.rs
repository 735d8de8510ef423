//! Billing endpoints: Stripe checkout session, billing portal

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::Tier;
use shared::error::{AppError, ErrorCode};

use crate::auth::UserIdentity;
use crate::service::SubscriptionService;
use crate::state::AppState;

use super::ApiResult;

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub price_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// POST /api/billing/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<CheckoutResponse> {
    let plan = state.stripe.plan_for_price(&req.price_id).ok_or_else(|| {
        AppError::new(ErrorCode::InvalidPrice).with_detail("price_id", req.price_id.clone())
    })?;

    let now = shared::util::now_millis();
    let service = SubscriptionService::load(state.store.clone(), &identity.user_id, now).await?;

    // Paying subscribers manage their plan through the portal
    if matches!(
        service.tier(now),
        Tier::PremiumActive | Tier::PremiumPaymentIssue
    ) {
        return Err(AppError::new(ErrorCode::AlreadyPremium));
    }

    // Create or reuse Stripe customer
    let customer_id = match service.record().stripe_customer_id.clone() {
        Some(cid) => cid,
        None => {
            let cid = state
                .stripe
                .create_customer(identity.email.as_deref(), &identity.user_id)
                .await
                .map_err(|e| {
                    tracing::error!(%e, user_id = %identity.user_id, "Failed to create Stripe customer");
                    AppError::new(ErrorCode::PaymentSetupFailed)
                })?;
            state
                .store
                .set_customer(&identity.user_id, &cid, now)
                .await
                .map_err(crate::error::ServiceError::from)?;
            cid
        }
    };

    let checkout_url = state
        .stripe
        .create_checkout_session(
            &customer_id,
            &req.price_id,
            &identity.user_id,
            &state.checkout_success_url,
            &state.checkout_cancel_url,
        )
        .await
        .map_err(|e| {
            tracing::error!(%e, user_id = %identity.user_id, "Failed to create Stripe checkout");
            AppError::new(ErrorCode::PaymentSetupFailed)
        })?;

    tracing::info!(user_id = %identity.user_id, plan = plan.as_str(), "Checkout session created");

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// POST /api/billing/portal
pub async fn billing_portal(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<PortalResponse> {
    let record = state
        .store
        .find_latest(&identity.user_id)
        .await
        .map_err(crate::error::ServiceError::from)?;

    let customer_id = record
        .and_then(|r| r.stripe_customer_id)
        .ok_or_else(|| AppError::new(ErrorCode::NoBillingAccount))?;

    let url = state
        .stripe
        .create_billing_portal_session(&customer_id, &state.portal_return_url)
        .await
        .map_err(|e| {
            tracing::error!("Billing portal error: {e}");
            AppError::new(ErrorCode::PaymentProviderError)
        })?;

    Ok(Json(PortalResponse { url }))
}
