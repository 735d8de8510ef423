use sqlx::PgPool;

use shared::{SubscriptionStatus, TimeBox};

const COLUMNS: &str = "id, user_id, plan_type, status, trial_end, beta_end, is_beta_tester,
    stripe_customer_id, stripe_subscription_id, current_period_end, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub user_id: String,
    pub plan_type: String,
    pub status: String,
    pub trial_end: Option<i64>,
    pub beta_end: Option<i64>,
    pub is_beta_tester: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Most recent subscription row for a user (duplicates are tolerated)
pub async fn find_latest(pool: &PgPool, user_id: &str) -> Result<Option<SubscriptionRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM subscriptions
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_default(
    pool: &PgPool,
    id: i64,
    user_id: &str,
    now: i64,
) -> Result<SubscriptionRow, sqlx::Error> {
    sqlx::query_as(&format!(
        "INSERT INTO subscriptions (id, user_id, plan_type, status, created_at, updated_at)
         VALUES ($1, $2, 'free', 'active', $3, $3)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Downgrade an expired trial/beta row to `free/active`.
///
/// Keyed on the row the resolver evaluated and only applied while it is still
/// in the expired state, so a concurrent provider update that already moved
/// the row elsewhere wins. Returns whether the row was changed.
pub async fn downgrade(
    pool: &PgPool,
    id: i64,
    expired: TimeBox,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let sql = match expired {
        TimeBox::Trial => {
            "UPDATE subscriptions
             SET plan_type = 'free', status = 'active', trial_end = NULL, updated_at = $2
             WHERE id = $1 AND plan_type = 'premium' AND status = 'trial'"
        }
        TimeBox::Beta => {
            "UPDATE subscriptions
             SET plan_type = 'free', status = 'active', beta_end = NULL,
                 is_beta_tester = FALSE, updated_at = $2
             WHERE id = $1 AND plan_type = 'premium' AND status = 'beta'"
        }
    };
    let result = sqlx::query(sql).bind(id).bind(now).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_customer(
    pool: &PgPool,
    user_id: &str,
    customer_id: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE subscriptions SET stripe_customer_id = $2, updated_at = $3 WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(customer_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark the user's latest row `premium/active` after checkout; inserts a
/// row when the user has none yet.
pub async fn upsert_checkout(
    pool: &PgPool,
    new_id: i64,
    user_id: &str,
    customer_id: Option<&str>,
    stripe_subscription_id: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE subscriptions
         SET plan_type = 'premium', status = 'active', trial_end = NULL,
             stripe_customer_id = COALESCE($2, stripe_customer_id),
             stripe_subscription_id = $3, updated_at = $4
         WHERE id = (
             SELECT id FROM subscriptions WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT 1
         )",
    )
    .bind(user_id)
    .bind(customer_id)
    .bind(stripe_subscription_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO subscriptions
                (id, user_id, plan_type, status, stripe_customer_id,
                 stripe_subscription_id, created_at, updated_at)
             VALUES ($1, $2, 'premium', 'active', $3, $4, $5, $5)",
        )
        .bind(new_id)
        .bind(user_id)
        .bind(customer_id)
        .bind(stripe_subscription_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Sync status (and optional period/trial end) from a provider event.
///
/// Every provider-driven status is a premium state, so the plan is restored
/// too; a row downgraded on read comes back once the provider reports it
/// live. Returns whether any local row carries that provider subscription ID.
pub async fn sync_status(
    pool: &PgPool,
    stripe_subscription_id: &str,
    status: SubscriptionStatus,
    current_period_end: Option<i64>,
    trial_end: Option<i64>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions
         SET plan_type = 'premium',
             status = $2,
             current_period_end = COALESCE($3, current_period_end),
             trial_end = COALESCE($4, trial_end),
             updated_at = $5
         WHERE stripe_subscription_id = $1",
    )
    .bind(stripe_subscription_id)
    .bind(status.as_db())
    .bind(current_period_end)
    .bind(trial_end)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
