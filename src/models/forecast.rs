// src/models/forecast.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPayload {
    pub hotel_id: Uuid,
    #[validate(range(min = 1, max = 90, message = "Days must be between 1 and 90."))]
    pub days: u32,
}

/// Aggregated daily performance fed into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyPerformance {
    pub stay_date: NaiveDate,
    pub rooms_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorRateSummary {
    pub stay_date: NaiveDate,
    pub average_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub occupancy: Decimal,
    pub adr: Decimal,
    pub recommended_rate: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    pub hotel_id: Uuid,
    pub days: Vec<ForecastDay>,
}
