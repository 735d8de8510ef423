//! Subscription status endpoint

use axum::{Extension, Json, extract::State};

use crate::auth::UserIdentity;
use crate::service::{SubscriptionService, SubscriptionView};
use crate::state::AppState;

use super::ApiResult;

/// GET /api/subscription
///
/// Expired trials and betas are downgraded here, on read.
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<SubscriptionView> {
    let now = shared::util::now_millis();
    let mut service = SubscriptionService::load(state.store.clone(), &identity.user_id, now).await?;
    service.downgrade_if_expired(now).await?;
    Ok(Json(service.view(now)))
}
