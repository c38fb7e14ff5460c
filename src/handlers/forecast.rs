// src/handlers/forecast.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        rbac::{PermForecastView, RequirePermission},
        tenancy::CompanyContext,
    },
    models::forecast::{ForecastPayload, ForecastResponse},
};

#[utoipa::path(
    post,
    path = "/api/forecast",
    tag = "Forecast",
    request_body = ForecastPayload,
    responses(
        (status = 200, description = "Daily occupancy, ADR and recommended rate", body = ForecastResponse),
        (status = 502, description = "The AI vendor failed or answered garbage"),
        (status = 503, description = "Forecasting is not configured")
    ),
    security(("api_jwt" = []))
)]
pub async fn forecast(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermForecastView>,
    CompanyContext(company_id): CompanyContext,
    Json(payload): Json<ForecastPayload>,
) -> Result<Json<ForecastResponse>, AppError> {
    payload.validate()?;
    let response = app_state
        .forecast_service
        .forecast(company_id, payload.hotel_id, payload.days)
        .await?;
    Ok(Json(response))
}
