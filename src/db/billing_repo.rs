// src/db/billing_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::billing::{
        Payment, PaymentStatus, SubscriptionPlan, SubscriptionStatus, UserSubscription, FREE_PLAN_CODE,
    },
};

#[derive(Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PLANS
    // =========================================================================

    pub async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>, AppError> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE is_active = TRUE ORDER BY price",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    pub async fn find_plan(&self, plan_id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn free_plan(&self, conn: &mut PgConnection) -> Result<SubscriptionPlan, AppError> {
        sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE code = $1")
            .bind(FREE_PLAN_CODE)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("free plan is missing from subscription_plans")))
    }

    // =========================================================================
    //  SUBSCRIPTIONS
    // =========================================================================

    pub async fn active_subscription(&self, company_id: Uuid) -> Result<Option<UserSubscription>, AppError> {
        let subscription = sqlx::query_as::<_, UserSubscription>(
            r#"
            SELECT * FROM user_subscriptions
            WHERE company_id = $1 AND status = 'active'
            ORDER BY starts_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    pub async fn create_subscription(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        user_id: Uuid,
        plan_id: Uuid,
        status: SubscriptionStatus,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<UserSubscription, AppError> {
        let subscription = sqlx::query_as::<_, UserSubscription>(
            r#"
            INSERT INTO user_subscriptions (company_id, user_id, plan_id, status, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(plan_id)
        .bind(status)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(subscription)
    }

    pub async fn find_subscription(
        &self,
        conn: &mut PgConnection,
        subscription_id: Uuid,
    ) -> Result<UserSubscription, AppError> {
        let subscription = sqlx::query_as::<_, UserSubscription>("SELECT * FROM user_subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(subscription)
    }

    pub async fn set_subscription_status(
        &self,
        conn: &mut PgConnection,
        subscription_id: Uuid,
        status: SubscriptionStatus,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<UserSubscription, AppError> {
        let subscription = sqlx::query_as::<_, UserSubscription>(
            r#"
            UPDATE user_subscriptions
            SET status = $2,
                starts_at = COALESCE($3, starts_at),
                ends_at = COALESCE($4, ends_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(status)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(subscription)
    }

    /// Cancels every active subscription of the company except `keep`.
    pub async fn cancel_active_subscriptions(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', ends_at = COALESCE(LEAST(ends_at, NOW()), NOW()), updated_at = NOW()
            WHERE company_id = $1 AND status = 'active' AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(company_id)
        .bind(keep)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  PAYMENTS
    // =========================================================================

    pub async fn create_payment(
        &self,
        conn: &mut PgConnection,
        subscription: &UserSubscription,
        amount: Decimal,
        currency: &str,
        stripe_session_id: &str,
    ) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (company_id, user_id, plan_id, subscription_id, amount, currency, stripe_session_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(subscription.company_id)
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.id)
        .bind(amount)
        .bind(currency)
        .bind(stripe_session_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn find_payment_by_session(
        &self,
        company_id: Uuid,
        stripe_session_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE stripe_session_id = $1 AND company_id = $2",
        )
        .bind(stripe_session_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    pub async fn find_payment_by_session_for_update(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        stripe_session_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE stripe_session_id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(stripe_session_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn set_payment_status(
        &self,
        conn: &mut PgConnection,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(payment_id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn list_payments(&self, company_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}
