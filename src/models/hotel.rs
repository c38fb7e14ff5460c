// src/models/hotel.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub total_rooms: i32,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub room_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateCategory {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Hotel with its children, as returned by `GET /api/hotels/{id}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HotelDetail {
    #[serde(flatten)]
    pub hotel: Hotel,
    pub room_types: Vec<RoomType>,
    pub rate_categories: Vec<RateCategory>,
}

fn validate_currency(code: &str) -> Result<(), validator::ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("currency");
    err.message = Some("Currency must be a 3-letter ISO code.".into());
    Err(err)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HotelPayload {
    #[validate(length(min = 1, message = "Hotel name is required."))]
    pub name: String,
    pub code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(range(min = 0, message = "Total rooms cannot be negative."))]
    #[serde(default)]
    pub total_rooms: i32,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypePayload {
    #[validate(length(min = 1, message = "Room type name is required."))]
    pub name: String,
    #[validate(range(min = 1, message = "Capacity must be at least 1."))]
    #[serde(default = "default_capacity")]
    pub capacity: i32,
    #[validate(range(min = 0, message = "Room count cannot be negative."))]
    #[serde(default)]
    pub room_count: i32,
}

fn default_capacity() -> i32 {
    2
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateCategoryPayload {
    #[validate(length(min = 1, message = "Rate category name is required."))]
    pub name: String,
    pub description: Option<String>,
    pub base_rate: Option<Decimal>,
}
