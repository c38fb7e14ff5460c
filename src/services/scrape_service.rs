// src/services/scrape_service.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{HotelRepository, ScrapeRepository},
    models::scrape::{
        RatesQuery, ScrapeRunPayload, ScrapeRunSummary, ScrapeSourceHotel, ScrapeSourcePayload,
        ScrapedRate, ScrapedRoomRate, SourceType,
    },
    services::ingest::values::parse_decimal,
};

const MAX_NIGHTS: u32 = 30;
const DEFAULT_CURRENCY: &str = "USD";

/// A vendor that can price one mapped listing for a stay.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn source_type(&self) -> SourceType;

    async fn fetch_rates(
        &self,
        listing: &ScrapeSourceHotel,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<Vec<ScrapedRoomRate>, AppError>;
}

// ---
// Booking.com through RapidAPI
// ---

pub struct BookingRapidApiSource {
    http: reqwest::Client,
    api_key: String,
    host: String,
}

impl BookingRapidApiSource {
    pub fn new(http: reqwest::Client, api_key: String, host: String) -> Self {
        Self { http, api_key, host }
    }
}

fn number_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Price and currency of a room-list "block", trying the fields the
/// endpoint has used over time.
fn block_price(block: &Value) -> Option<(Decimal, Option<String>)> {
    let candidates = [
        &block["product_price_breakdown"]["gross_amount"],
        &block["price_breakdown"]["gross_price"],
        &block["min_price"],
    ];
    for candidate in candidates {
        let price = number_of(&candidate["value"]).or_else(|| number_of(&candidate["price"]));
        if let Some(price) = price {
            return Some((price, text_of(&candidate["currency"])));
        }
    }
    number_of(&block["price"]).map(|p| (p, text_of(&block["currency"])))
}

/// Flattens the `block` arrays of a room-list response into room/rate rows.
pub fn extract_booking_rates(body: &Value) -> Vec<ScrapedRoomRate> {
    let entries: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    entries
        .into_iter()
        .filter_map(|entry| entry["block"].as_array())
        .flatten()
        .filter_map(|block| {
            let (price, currency) = block_price(block)?;
            let room_name = text_of(&block["room_name"])
                .or_else(|| text_of(&block["name_without_policy"]))
                .or_else(|| text_of(&block["name"]))?;
            let rate_name = text_of(&block["name"]).filter(|n| n != &room_name);
            Some(ScrapedRoomRate {
                room_name,
                rate_name,
                price,
                currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            })
        })
        .collect()
}

#[async_trait]
impl RateSource for BookingRapidApiSource {
    fn source_type(&self) -> SourceType {
        SourceType::Booking
    }

    async fn fetch_rates(
        &self,
        listing: &ScrapeSourceHotel,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<Vec<ScrapedRoomRate>, AppError> {
        let checkin = checkin.to_string();
        let checkout = checkout.to_string();
        let response = self
            .http
            .get(format!("https://{}/v1/hotels/room-list", self.host))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(&[
                ("hotel_id", listing.external_id.as_str()),
                ("checkin_date", checkin.as_str()),
                ("checkout_date", checkout.as_str()),
                ("adults_number_by_rooms", "2"),
                ("units", "metric"),
                ("locale", "en-gb"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        Ok(extract_booking_rates(&body))
    }
}

// ---
// Expedia through ScrapingBee
// ---

pub struct ExpediaScrapingBeeSource {
    http: reqwest::Client,
    api_key: String,
}

impl ExpediaScrapingBeeSource {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn listing_url(listing: &ScrapeSourceHotel, checkin: NaiveDate, checkout: NaiveDate) -> String {
        let base = listing
            .url
            .clone()
            .unwrap_or_else(|| format!("https://www.expedia.com/h{}.Hotel-Information", listing.external_id));
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{}{}chkin={}&chkout={}&rm1=a2", base, sep, checkin, checkout)
    }
}

fn currency_from_symbol(text: &str) -> Option<&'static str> {
    [("€", "EUR"), ("£", "GBP"), ("₹", "INR"), ("¥", "JPY"), ("$", "USD")]
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| *code)
}

/// Reads the `rooms` list produced by the extract rules.
pub fn extract_expedia_rates(body: &Value) -> Vec<ScrapedRoomRate> {
    body["rooms"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|room| {
            let room_name = text_of(&room["name"])?;
            let price_text = text_of(&room["price"])?;
            let price = parse_decimal(&price_text)?;
            Some(ScrapedRoomRate {
                room_name,
                rate_name: text_of(&room["rate"]),
                price,
                currency: currency_from_symbol(&price_text)
                    .unwrap_or(DEFAULT_CURRENCY)
                    .to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl RateSource for ExpediaScrapingBeeSource {
    fn source_type(&self) -> SourceType {
        SourceType::Expedia
    }

    async fn fetch_rates(
        &self,
        listing: &ScrapeSourceHotel,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<Vec<ScrapedRoomRate>, AppError> {
        let extract_rules = json!({
            "rooms": {
                "selector": "[data-stid='property-offer'], [data-stid='section-room-list'] > div",
                "type": "list",
                "output": {
                    "name": "h3",
                    "rate": "[data-stid='rate-plan-name']",
                    "price": "[data-test-id='price-summary-message-line'] span, .uitk-lockup-price"
                }
            }
        })
        .to_string();
        let target = Self::listing_url(listing, checkin, checkout);

        let response = self
            .http
            .get("https://app.scrapingbee.com/api/v1/")
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("url", target.as_str()),
                ("render_js", "true"),
                ("premium_proxy", "true"),
                ("extract_rules", extract_rules.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        Ok(extract_expedia_rates(&body))
    }
}

// ---
// Service
// ---

/// The `x-scrape-secret` gate of the run endpoint.
pub fn check_scrape_secret(configured: Option<&str>, provided: Option<&str>) -> Result<(), AppError> {
    let configured = configured.ok_or(AppError::NotConfigured("Scraping"))?;
    match provided {
        Some(provided) if provided == configured => Ok(()),
        _ => Err(AppError::InvalidToken),
    }
}

/// Check-in defaults to tomorrow and the stay to one night.
pub fn stay_window(payload: &ScrapeRunPayload, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), AppError> {
    let out_of_range = || AppError::bad_request("The stay falls outside the supported calendar.");
    let checkin = match payload.checkin {
        Some(checkin) => checkin,
        None => today.checked_add_days(Days::new(1)).ok_or_else(out_of_range)?,
    };
    let nights = payload.nights.unwrap_or(1);
    if !(1..=MAX_NIGHTS).contains(&nights) {
        return Err(AppError::bad_request(format!("nights must be between 1 and {}.", MAX_NIGHTS)));
    }
    let checkout = checkin
        .checked_add_days(Days::new(u64::from(nights)))
        .ok_or_else(out_of_range)?;
    Ok((checkin, checkout))
}

#[derive(Clone)]
pub struct ScrapeService {
    repo: ScrapeRepository,
    hotel_repo: HotelRepository,
    sources: Arc<HashMap<SourceType, Arc<dyn RateSource>>>,
}

impl ScrapeService {
    pub fn new(repo: ScrapeRepository, hotel_repo: HotelRepository, sources: Vec<Arc<dyn RateSource>>) -> Self {
        let sources = sources.into_iter().map(|s| (s.source_type(), s)).collect();
        Self { repo, hotel_repo, sources: Arc::new(sources) }
    }

    async fn ensure_hotel(&self, company_id: Uuid, hotel_id: Uuid) -> Result<(), AppError> {
        self.hotel_repo
            .find(company_id, hotel_id)
            .await?
            .map(|_| ())
            .ok_or(AppError::NotFound("Hotel"))
    }

    pub async fn list_sources(&self, company_id: Uuid, hotel_id: Uuid) -> Result<Vec<ScrapeSourceHotel>, AppError> {
        self.ensure_hotel(company_id, hotel_id).await?;
        self.repo.list_sources(hotel_id).await
    }

    pub async fn create_source(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        payload: &ScrapeSourcePayload,
    ) -> Result<ScrapeSourceHotel, AppError> {
        self.ensure_hotel(company_id, hotel_id).await?;
        self.repo.create_source(hotel_id, payload).await
    }

    pub async fn update_source(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        source_id: Uuid,
        payload: &ScrapeSourcePayload,
    ) -> Result<ScrapeSourceHotel, AppError> {
        self.ensure_hotel(company_id, hotel_id).await?;
        self.repo
            .update_source(hotel_id, source_id, payload)
            .await?
            .ok_or(AppError::NotFound("Scrape source"))
    }

    pub async fn delete_source(&self, company_id: Uuid, hotel_id: Uuid, source_id: Uuid) -> Result<(), AppError> {
        self.ensure_hotel(company_id, hotel_id).await?;
        match self.repo.delete_source(hotel_id, source_id).await? {
            0 => Err(AppError::NotFound("Scrape source")),
            _ => Ok(()),
        }
    }

    pub async fn list_rates(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        query: &RatesQuery,
    ) -> Result<Vec<ScrapedRate>, AppError> {
        self.ensure_hotel(company_id, hotel_id).await?;
        self.repo.list_rates(hotel_id, query.from, query.to).await
    }

    async fn scrape_one(
        &self,
        listing: &ScrapeSourceHotel,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<usize, AppError> {
        let source = self
            .sources
            .get(&listing.source_type)
            .ok_or(AppError::NotConfigured("Rate source"))?;
        let rates = source.fetch_rates(listing, checkin, checkout).await?;
        self.repo.insert_rates(listing, checkin, &rates).await
    }

    /// Walks every saved mapping. A failing listing is logged and counted but
    /// never stops the run.
    pub async fn run(&self, payload: &ScrapeRunPayload) -> Result<ScrapeRunSummary, AppError> {
        let (checkin, checkout) = stay_window(payload, Utc::now().date_naive())?;
        let listings = self.repo.list_all_sources().await?;

        tracing::info!("🔎 Scrape run: {} listing(s), {} → {}", listings.len(), checkin, checkout);

        let mut summary = ScrapeRunSummary::default();
        for listing in &listings {
            match self.scrape_one(listing, checkin, checkout).await {
                Ok(inserted) => {
                    summary.processed += 1;
                    summary.inserted += inserted;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        source_id = %listing.id,
                        hotel_id = %listing.hotel_id,
                        source_type = ?listing.source_type,
                        "Scrape failed: {}",
                        e
                    );
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            inserted = summary.inserted,
            "Scrape run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn booking_blocks_are_flattened() {
        let body = json!([{
            "hotel_id": 1,
            "block": [
                {
                    "room_name": "Deluxe Double Room",
                    "name": "Deluxe Double Room - Breakfast included",
                    "product_price_breakdown": { "gross_amount": { "value": 182.5, "currency": "EUR" } }
                },
                {
                    "name_without_policy": "Standard Twin",
                    "name": "Standard Twin",
                    "min_price": { "price": "99.00", "currency": "GBP" }
                },
                { "room_name": "No price here" }
            ]
        }]);

        let rates = extract_booking_rates(&body);
        assert_eq!(
            rates,
            vec![
                ScrapedRoomRate {
                    room_name: "Deluxe Double Room".into(),
                    rate_name: Some("Deluxe Double Room - Breakfast included".into()),
                    price: dec("182.5"),
                    currency: "EUR".into(),
                },
                ScrapedRoomRate {
                    room_name: "Standard Twin".into(),
                    rate_name: None,
                    price: dec("99.00"),
                    currency: "GBP".into(),
                },
            ]
        );
    }

    #[test]
    fn booking_object_body_and_missing_blocks() {
        let body = json!({ "block": [{ "name": "Suite", "price": 300 }] });
        let rates = extract_booking_rates(&body);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].currency, "USD");
        assert!(extract_booking_rates(&json!({ "error": "quota" })).is_empty());
    }

    #[test]
    fn expedia_rooms_are_parsed_from_display_prices() {
        let body = json!({
            "rooms": [
                { "name": "King Room", "rate": "Non-refundable", "price": "€1,204" },
                { "name": "Queen Room", "price": "$189 total" },
                { "name": "Sold out", "price": "" },
                { "price": "$10" }
            ]
        });
        let rates = extract_expedia_rates(&body);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].price, dec("1204"));
        assert_eq!(rates[0].currency, "EUR");
        assert_eq!(rates[0].rate_name.as_deref(), Some("Non-refundable"));
        assert_eq!(rates[1].price, dec("189"));
        assert_eq!(rates[1].currency, "USD");
    }

    #[test]
    fn listing_url_appends_the_stay() {
        let listing = ScrapeSourceHotel {
            id: Uuid::new_v4(),
            hotel_id: Uuid::new_v4(),
            source_type: SourceType::Expedia,
            external_id: "12345".into(),
            url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert_eq!(
            ExpediaScrapingBeeSource::listing_url(&listing, d1, d2),
            "https://www.expedia.com/h12345.Hotel-Information?chkin=2024-06-01&chkout=2024-06-02&rm1=a2"
        );
    }

    #[test]
    fn secret_gate() {
        assert!(matches!(check_scrape_secret(None, Some("x")), Err(AppError::NotConfigured(_))));
        assert!(matches!(check_scrape_secret(Some("s3cret"), None), Err(AppError::InvalidToken)));
        assert!(matches!(check_scrape_secret(Some("s3cret"), Some("nope")), Err(AppError::InvalidToken)));
        assert!(check_scrape_secret(Some("s3cret"), Some("s3cret")).is_ok());
    }

    #[test]
    fn stay_window_defaults_and_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (checkin, checkout) = stay_window(&ScrapeRunPayload::default(), today).unwrap();
        assert_eq!(checkin, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(checkout, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());

        let payload = ScrapeRunPayload { checkin: Some(today), nights: Some(3) };
        assert_eq!(stay_window(&payload, today).unwrap().1, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());

        let payload = ScrapeRunPayload { checkin: None, nights: Some(0) };
        assert!(stay_window(&payload, today).is_err());
    }

    #[test]
    fn stay_past_the_last_calendar_day_is_a_bad_request() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let payload = ScrapeRunPayload { checkin: Some(NaiveDate::MAX), nights: Some(1) };
        assert!(matches!(stay_window(&payload, today), Err(AppError::BadRequest(_))));
        assert!(matches!(
            stay_window(&ScrapeRunPayload::default(), NaiveDate::MAX),
            Err(AppError::BadRequest(_))
        ));
    }
}
