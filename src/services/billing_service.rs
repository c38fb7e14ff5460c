// src/services/billing_service.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sqlx::PgPool;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CheckoutSessionStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BillingRepository,
    models::{
        auth::User,
        billing::{
            CheckoutResponse, CurrentSubscription, Payment, PaymentStatus, SubscriptionPlan,
            SubscriptionStatus, VerifyPaymentResponse,
        },
    },
    services::notification_service::NotificationService,
};

/// What a checkout session should charge.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Paid,
    Unpaid,
    Expired,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSessionInfo, AppError>;

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, AppError>;
}

pub struct StripeGateway {
    client: Client,
    default_currency: Currency,
}

impl StripeGateway {
    pub fn new(secret_key: &str, default_currency: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            default_currency: parse_currency(default_currency).unwrap_or(Currency::USD),
        }
    }
}

fn parse_currency(code: &str) -> Option<Currency> {
    serde_json::from_value(serde_json::Value::String(code.trim().to_lowercase())).ok()
}

fn stripe_error(e: stripe::StripeError) -> AppError {
    AppError::ExternalService(format!("Stripe: {}", e))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSessionInfo, AppError> {
        let currency = parse_currency(&request.currency).unwrap_or(self.default_currency);

        let params = CreateCheckoutSession {
            success_url: Some(&request.success_url),
            cancel_url: Some(&request.cancel_url),
            mode: Some(CheckoutSessionMode::Payment),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency,
                    unit_amount: Some(request.amount_cents),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: request.product_name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        };

        let session = CheckoutSession::create(&self.client, params).await.map_err(stripe_error)?;
        let url = session
            .url
            .ok_or_else(|| AppError::ExternalService("Stripe returned a session without a URL".into()))?;

        Ok(CheckoutSessionInfo { id: session.id.to_string(), url })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, AppError> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| AppError::bad_request("Invalid checkout session id."))?;
        let session = CheckoutSession::retrieve(&self.client, &id, &[]).await.map_err(stripe_error)?;

        Ok(match (session.payment_status, session.status) {
            (CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired, _) => {
                SessionStatus::Paid
            }
            (_, Some(CheckoutSessionStatus::Expired)) => SessionStatus::Expired,
            _ => SessionStatus::Unpaid,
        })
    }
}

/// Outcome of verifying a pending payment against the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    AlreadySettled,
    Activate,
    StillPending,
    Fail,
}

pub fn settle(current: PaymentStatus, gateway: Option<SessionStatus>) -> Settlement {
    match (current, gateway) {
        (PaymentStatus::Success | PaymentStatus::Failed, _) => Settlement::AlreadySettled,
        (PaymentStatus::Pending, Some(SessionStatus::Paid)) => Settlement::Activate,
        (PaymentStatus::Pending, Some(SessionStatus::Expired)) => Settlement::Fail,
        (PaymentStatus::Pending, Some(SessionStatus::Unpaid) | None) => Settlement::StillPending,
    }
}

pub fn amount_in_cents(price: Decimal) -> Result<i64, AppError> {
    (price * Decimal::from(100))
        .round()
        .to_i64()
        .filter(|cents| *cents > 0)
        .ok_or_else(|| AppError::bad_request("The plan price cannot be charged."))
}

fn period_end(start: DateTime<Utc>, interval_months: i32) -> Option<DateTime<Utc>> {
    let months = u32::try_from(interval_months).ok().filter(|m| *m > 0)?;
    start.checked_add_months(Months::new(months))
}

#[derive(Clone)]
pub struct BillingService {
    repo: BillingRepository,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifications: NotificationService,
    frontend_url: String,
    pool: PgPool,
}

impl BillingService {
    pub fn new(
        repo: BillingRepository,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: NotificationService,
        frontend_url: String,
        pool: PgPool,
    ) -> Self {
        Self { repo, gateway, notifications, frontend_url, pool }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, AppError> {
        self.gateway.as_ref().ok_or(AppError::NotConfigured("Stripe"))
    }

    pub async fn plans(&self) -> Result<Vec<SubscriptionPlan>, AppError> {
        self.repo.list_active_plans().await
    }

    async fn plan(&self, plan_id: Uuid) -> Result<SubscriptionPlan, AppError> {
        self.repo.find_plan(plan_id).await?.ok_or(AppError::NotFound("Plan"))
    }

    pub async fn current(&self, company_id: Uuid) -> Result<CurrentSubscription, AppError> {
        let subscription = self
            .repo
            .active_subscription(company_id)
            .await?
            .ok_or(AppError::NotFound("Active subscription"))?;
        let plan = self.plan(subscription.plan_id).await?;
        Ok(CurrentSubscription { subscription, plan })
    }

    pub async fn payments(&self, company_id: Uuid) -> Result<Vec<Payment>, AppError> {
        self.repo.list_payments(company_id).await
    }

    /// Opens a hosted checkout for a paid plan and records the pending
    /// subscription and payment behind it.
    pub async fn checkout(&self, company_id: Uuid, user: &User, plan_id: Uuid) -> Result<CheckoutResponse, AppError> {
        let plan = self.plan(plan_id).await?;
        if !plan.is_active {
            return Err(AppError::NotFound("Plan"));
        }
        if plan.is_free() {
            return Err(AppError::bad_request("The free plan does not need a checkout."));
        }
        let gateway = self.gateway()?;

        let metadata = HashMap::from([
            ("companyId".to_string(), company_id.to_string()),
            ("userId".to_string(), user.id.to_string()),
            ("planId".to_string(), plan.id.to_string()),
        ]);
        let session = gateway
            .create_checkout(&CheckoutRequest {
                product_name: plan.name.clone(),
                amount_cents: amount_in_cents(plan.price)?,
                currency: plan.currency.clone(),
                success_url: format!("{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}", self.frontend_url),
                cancel_url: format!("{}/billing/cancel", self.frontend_url),
                metadata,
            })
            .await?;

        let mut tx = self.pool.begin().await?;
        let subscription = self
            .repo
            .create_subscription(&mut tx, company_id, user.id, plan.id, SubscriptionStatus::Pending, None, None)
            .await?;
        self.repo
            .create_payment(&mut tx, &subscription, plan.price, &plan.currency, &session.id)
            .await?;
        tx.commit().await?;

        tracing::info!(company_id = %company_id, plan = %plan.code, session_id = %session.id, "💳 Checkout opened");

        Ok(CheckoutResponse { session_id: session.id, url: session.url })
    }

    /// Polls the gateway for a checkout session. Settled payments are
    /// returned as they are without asking the gateway again.
    pub async fn verify(&self, company_id: Uuid, session_id: &str) -> Result<VerifyPaymentResponse, AppError> {
        // Gateway first, row lock second; the locked status decides.
        let seen = self
            .repo
            .find_payment_by_session(company_id, session_id)
            .await?
            .ok_or(AppError::NotFound("Payment"))?;

        let gateway_status = match seen.status {
            PaymentStatus::Pending => Some(self.gateway()?.session_status(session_id).await?),
            _ => None,
        };
        let plan = self.plan(seen.plan_id).await?;

        let mut tx = self.pool.begin().await?;

        let payment = self
            .repo
            .find_payment_by_session_for_update(&mut tx, company_id, session_id)
            .await?
            .ok_or(AppError::NotFound("Payment"))?;

        let (payment, subscription) = match settle(payment.status, gateway_status) {
            Settlement::AlreadySettled | Settlement::StillPending => {
                let subscription = self.repo.find_subscription(&mut tx, payment.subscription_id).await?;
                (payment, subscription)
            }
            Settlement::Activate => {
                let now = Utc::now();
                self.repo
                    .cancel_active_subscriptions(&mut tx, company_id, Some(payment.subscription_id))
                    .await?;
                let subscription = self
                    .repo
                    .set_subscription_status(
                        &mut tx,
                        payment.subscription_id,
                        SubscriptionStatus::Active,
                        Some(now),
                        period_end(now, plan.interval_months),
                    )
                    .await?;
                let payment = self.repo.set_payment_status(&mut tx, payment.id, PaymentStatus::Success).await?;

                self.notifications
                    .notify(
                        &mut *tx,
                        payment.user_id,
                        "Subscription active",
                        &format!("Your {} plan is now active.", plan.name),
                        Some("/billing"),
                    )
                    .await?;

                tracing::info!(company_id = %company_id, payment_id = %payment.id, "Payment succeeded");
                (payment, subscription)
            }
            Settlement::Fail => {
                let subscription = self
                    .repo
                    .set_subscription_status(&mut tx, payment.subscription_id, SubscriptionStatus::Cancelled, None, None)
                    .await?;
                let payment = self.repo.set_payment_status(&mut tx, payment.id, PaymentStatus::Failed).await?;
                tracing::info!(company_id = %company_id, payment_id = %payment.id, "Checkout session expired");
                (payment, subscription)
            }
        };

        tx.commit().await?;
        Ok(VerifyPaymentResponse { payment, subscription })
    }

    /// Drops the company back to the free plan.
    pub async fn cancel(&self, company_id: Uuid, user: &User) -> Result<CurrentSubscription, AppError> {
        let current = self.current(company_id).await?;
        if current.plan.is_free() {
            return Err(AppError::bad_request("The company is already on the free plan."));
        }

        let mut tx = self.pool.begin().await?;
        self.repo.cancel_active_subscriptions(&mut tx, company_id, None).await?;
        let plan = self.repo.free_plan(&mut tx).await?;
        let subscription = self
            .repo
            .create_subscription(&mut tx, company_id, user.id, plan.id, SubscriptionStatus::Active, Some(Utc::now()), None)
            .await?;
        tx.commit().await?;

        tracing::info!(company_id = %company_id, cancelled_by = %user.id, "Subscription cancelled");
        Ok(CurrentSubscription { subscription, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn settlement_transitions() {
        use PaymentStatus::*;
        assert_eq!(settle(Pending, Some(SessionStatus::Paid)), Settlement::Activate);
        assert_eq!(settle(Pending, Some(SessionStatus::Unpaid)), Settlement::StillPending);
        assert_eq!(settle(Pending, Some(SessionStatus::Expired)), Settlement::Fail);
        assert_eq!(settle(Success, Some(SessionStatus::Expired)), Settlement::AlreadySettled);
        assert_eq!(settle(Failed, Some(SessionStatus::Paid)), Settlement::AlreadySettled);
        assert_eq!(settle(Success, None), Settlement::AlreadySettled);
    }

    #[test]
    fn locked_status_wins_over_a_stale_gateway_answer() {
        // Another verify settled the payment while this one was asking the gateway.
        assert_eq!(settle(PaymentStatus::Success, Some(SessionStatus::Paid)), Settlement::AlreadySettled);
        assert_eq!(settle(PaymentStatus::Failed, Some(SessionStatus::Expired)), Settlement::AlreadySettled);
    }

    #[test]
    fn prices_are_charged_in_cents() {
        assert_eq!(amount_in_cents(Decimal::from_str("49.90").unwrap()).unwrap(), 4990);
        assert_eq!(amount_in_cents(Decimal::from_str("0.015").unwrap()).unwrap(), 2);
        assert!(amount_in_cents(Decimal::ZERO).is_err());
    }

    #[test]
    fn period_end_adds_calendar_months() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(period_end(start, 1), Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()));
        assert_eq!(period_end(start, 12), Some(Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap()));
        assert_eq!(period_end(start, 0), None);
    }

    #[test]
    fn currency_codes_are_case_insensitive() {
        assert_eq!(parse_currency("EUR"), Some(Currency::EUR));
        assert_eq!(parse_currency("usd"), Some(Currency::USD));
        assert_eq!(parse_currency("nope"), None);
    }
}
