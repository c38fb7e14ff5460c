// src/handlers/billing.rs

use axum::{extract::State, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermBillingUpdate, PermBillingView, RequirePermission},
        tenancy::CompanyContext,
    },
    models::billing::{
        CheckoutPayload, CheckoutResponse, CurrentSubscription, Payment, SubscriptionPlan, VerifyPaymentPayload,
        VerifyPaymentResponse,
    },
};

#[utoipa::path(
    get,
    path = "/api/billing/plans",
    tag = "Billing",
    responses((status = 200, body = Vec<SubscriptionPlan>)),
    security(("api_jwt" = []))
)]
pub async fn list_plans(State(app_state): State<AppState>) -> Result<Json<Vec<SubscriptionPlan>>, AppError> {
    Ok(Json(app_state.billing_service.plans().await?))
}

#[utoipa::path(
    get,
    path = "/api/billing/subscription",
    tag = "Billing",
    responses((status = 200, body = CurrentSubscription), (status = 404, description = "No active subscription")),
    security(("api_jwt" = []))
)]
pub async fn current_subscription(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermBillingView>,
    CompanyContext(company_id): CompanyContext,
) -> Result<Json<CurrentSubscription>, AppError> {
    Ok(Json(app_state.billing_service.current(company_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/billing/checkout",
    tag = "Billing",
    request_body = CheckoutPayload,
    responses(
        (status = 200, description = "Hosted checkout opened", body = CheckoutResponse),
        (status = 400, description = "The free plan needs no checkout"),
        (status = 503, description = "Payments are not configured")
    ),
    security(("api_jwt" = []))
)]
pub async fn checkout(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermBillingUpdate>,
    AuthenticatedUser(user): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let response = app_state
        .billing_service
        .checkout(company_id, &user, payload.plan_id)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/billing/verify",
    tag = "Billing",
    request_body = VerifyPaymentPayload,
    responses((status = 200, description = "Payment and subscription after settlement", body = VerifyPaymentResponse)),
    security(("api_jwt" = []))
)]
pub async fn verify_payment(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermBillingUpdate>,
    CompanyContext(company_id): CompanyContext,
    Json(payload): Json<VerifyPaymentPayload>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::bad_request("sessionId is required."));
    }
    Ok(Json(app_state.billing_service.verify(company_id, session_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/billing/cancel",
    tag = "Billing",
    responses((status = 200, description = "Back on the free plan", body = CurrentSubscription)),
    security(("api_jwt" = []))
)]
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermBillingUpdate>,
    AuthenticatedUser(user): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
) -> Result<Json<CurrentSubscription>, AppError> {
    Ok(Json(app_state.billing_service.cancel(company_id, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/billing/payments",
    tag = "Billing",
    responses((status = 200, body = Vec<Payment>)),
    security(("api_jwt" = []))
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermBillingView>,
    CompanyContext(company_id): CompanyContext,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(app_state.billing_service.payments(company_id).await?))
}
