// src/models/scrape.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scrape_source_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Booking,
    Expedia,
}

/// Maps one of our hotels to its listing on an external site.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSourceHotel {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub source_type: SourceType,
    pub external_id: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedRate {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub source_hotel_id: Uuid,
    pub source_type: SourceType,
    pub checkin_date: NaiveDate,
    pub room_name: String,
    pub rate_name: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub scraped_at: DateTime<Utc>,
}

/// A room/rate pair pulled out of a vendor response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedRoomRate {
    pub room_name: String,
    pub rate_name: Option<String>,
    pub price: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSourcePayload {
    pub source_type: SourceType,
    #[validate(length(min = 1, message = "External listing id is required."))]
    pub external_id: String,
    #[validate(url(message = "The URL is invalid."))]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ScrapeRunPayload {
    pub checkin: Option<NaiveDate>,
    pub nights: Option<u32>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ScrapeRunSummary {
    pub processed: usize,
    pub failed: usize,
    pub inserted: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RatesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
