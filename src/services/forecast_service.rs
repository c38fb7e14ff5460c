// src/services/forecast_service.rs

use std::{collections::BTreeMap, fmt::Write as _};

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{HotelRepository, ScrapeRepository, UploadRepository},
    models::{
        forecast::{CompetitorRateSummary, DailyPerformance, ForecastDay, ForecastResponse},
        hotel::Hotel,
        scrape::ScrapedRate,
    },
};

const HISTORY_DAYS: i64 = 90;
const MAX_HORIZON: u32 = 90;
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You are a hotel revenue manager. Answer with a JSON array only, no prose.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self { http, api_key, model }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!("OpenAI returned {}: {}", status, body)));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::ExternalService("OpenAI returned an empty answer".into()))
    }
}

/// Daily history line: rooms sold, occupancy against the hotel inventory
/// and ADR (revenue per room sold).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub rooms_sold: i64,
    pub occupancy: Decimal,
    pub adr: Decimal,
    pub competitor_rate: Option<Decimal>,
}

fn percent(part: i64, whole: i32) -> Decimal {
    if whole <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::from(100) / Decimal::from(whole))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

pub fn summarize_history(
    total_rooms: i32,
    performance: &[DailyPerformance],
    competitors: &[CompetitorRateSummary],
) -> Vec<HistoryDay> {
    let competitor_by_date: BTreeMap<_, _> = competitors.iter().map(|c| (c.stay_date, c.average_rate)).collect();

    performance
        .iter()
        .map(|day| HistoryDay {
            date: day.stay_date,
            rooms_sold: day.rooms_sold,
            occupancy: percent(day.rooms_sold, total_rooms),
            adr: if day.rooms_sold > 0 {
                (day.revenue / Decimal::from(day.rooms_sold)).round_dp(2)
            } else {
                Decimal::ZERO
            },
            competitor_rate: competitor_by_date.get(&day.stay_date).map(|r| r.round_dp(2)),
        })
        .collect()
}

/// Average scraped price per check-in date.
pub fn market_rates(rates: &[ScrapedRate]) -> BTreeMap<NaiveDate, Decimal> {
    let mut sums: BTreeMap<NaiveDate, (Decimal, u32)> = BTreeMap::new();
    for rate in rates {
        let entry = sums.entry(rate.checkin_date).or_insert((Decimal::ZERO, 0));
        entry.0 += rate.price;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, (sum / Decimal::from(count)).round_dp(2)))
        .collect()
}

pub fn build_prompt(
    hotel: &Hotel,
    start: NaiveDate,
    days: u32,
    history: &[HistoryDay],
    market: &BTreeMap<NaiveDate, Decimal>,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Hotel: {} ({} rooms, prices in {}).",
        hotel.name, hotel.total_rooms, hotel.currency
    );
    if let Some(city) = &hotel.city {
        let _ = writeln!(prompt, "Location: {}.", city);
    }

    let _ = writeln!(prompt, "\nHistory (date, rooms sold, occupancy %, ADR, competitor average):");
    if history.is_empty() {
        let _ = writeln!(prompt, "no saved booking data");
    }
    for day in history {
        let competitor = day.competitor_rate.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(prompt, "{}, {}, {}, {}, {}", day.date, day.rooms_sold, day.occupancy, day.adr, competitor);
    }

    if !market.is_empty() {
        let _ = writeln!(prompt, "\nCurrent online market rates by check-in date:");
        for (date, rate) in market {
            let _ = writeln!(prompt, "{}, {}", date, rate);
        }
    }

    let end = start + Duration::days(i64::from(days) - 1);
    let _ = writeln!(
        prompt,
        "\nForecast every day from {} to {} ({} days). Reply with a JSON array of objects \
         {{\"date\": \"YYYY-MM-DD\", \"occupancy\": percent, \"adr\": number, \"recommendedRate\": number}}.",
        start, end, days
    );
    prompt
}

/// Reads the model answer, tolerating markdown fences and text around the array.
pub fn parse_forecast(answer: &str) -> Result<Vec<ForecastDay>, AppError> {
    let trimmed = answer.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let json = match (unfenced.find('['), unfenced.rfind(']')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => return Err(AppError::ExternalService("the forecast answer holds no JSON array".into())),
    };

    let mut days: Vec<ForecastDay> = serde_json::from_str(json)
        .map_err(|e| AppError::ExternalService(format!("the forecast answer is not valid JSON: {}", e)))?;
    days.sort_by_key(|d| d.date);
    Ok(days)
}

#[derive(Clone)]
pub struct ForecastService {
    upload_repo: UploadRepository,
    hotel_repo: HotelRepository,
    scrape_repo: ScrapeRepository,
    client: Option<OpenAiClient>,
}

impl ForecastService {
    pub fn new(
        upload_repo: UploadRepository,
        hotel_repo: HotelRepository,
        scrape_repo: ScrapeRepository,
        client: Option<OpenAiClient>,
    ) -> Self {
        Self { upload_repo, hotel_repo, scrape_repo, client }
    }

    pub async fn forecast(&self, company_id: Uuid, hotel_id: Uuid, days: u32) -> Result<ForecastResponse, AppError> {
        if !(1..=MAX_HORIZON).contains(&days) {
            return Err(AppError::bad_request(format!("days must be between 1 and {}.", MAX_HORIZON)));
        }
        let client = self.client.as_ref().ok_or(AppError::NotConfigured("OpenAI"))?;
        let hotel = self
            .hotel_repo
            .find(company_id, hotel_id)
            .await?
            .ok_or(AppError::NotFound("Hotel"))?;

        let today = Utc::now().date_naive();
        let history_from = today - Duration::days(HISTORY_DAYS);
        let horizon_end = today + Duration::days(i64::from(days));

        let performance = self.upload_repo.daily_performance(hotel.id, history_from, today).await?;
        let competitors = self.upload_repo.competitor_rates(hotel.id, history_from, today).await?;
        let scraped = self.scrape_repo.list_rates(hotel.id, Some(today), Some(horizon_end)).await?;

        let history = summarize_history(hotel.total_rooms, &performance, &competitors);
        let market = market_rates(&scraped);
        let prompt = build_prompt(&hotel, today + Duration::days(1), days, &history, &market);

        tracing::debug!(hotel_id = %hotel.id, history = history.len(), market = market.len(), "Requesting forecast");

        let answer = client.complete(&prompt).await?;
        let days = parse_forecast(&answer)?;

        tracing::info!(hotel_id = %hotel.id, days = days.len(), "📈 Forecast generated");
        Ok(ForecastResponse { hotel_id: hotel.id, days })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[test]
    fn history_computes_occupancy_and_adr() {
        let performance = vec![
            DailyPerformance { stay_date: date(1), rooms_sold: 40, revenue: dec("5000") },
            DailyPerformance { stay_date: date(2), rooms_sold: 0, revenue: Decimal::ZERO },
        ];
        let competitors = vec![CompetitorRateSummary { stay_date: date(1), average_rate: dec("131.333") }];

        let history = summarize_history(80, &performance, &competitors);
        assert_eq!(history[0].occupancy, dec("50.0"));
        assert_eq!(history[0].adr, dec("125"));
        assert_eq!(history[0].competitor_rate, Some(dec("131.33")));
        assert_eq!(history[1].adr, Decimal::ZERO);
        assert_eq!(history[1].competitor_rate, None);
    }

    #[test]
    fn zero_inventory_means_zero_occupancy() {
        assert_eq!(percent(10, 0), Decimal::ZERO);
        assert_eq!(percent(1, 3), dec("33.3"));
    }

    #[test]
    fn parses_fenced_answers() {
        let answer = "```json\n[{\"date\":\"2024-07-02\",\"occupancy\":71.5,\"adr\":120,\"recommendedRate\":129},\
                      {\"date\":\"2024-07-01\",\"occupancy\":65,\"adr\":118.5,\"recommendedRate\":125}]\n```";
        let days = parse_forecast(answer).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(1));
        assert_eq!(days[1].recommended_rate, dec("129"));
    }

    #[test]
    fn parses_arrays_wrapped_in_prose() {
        let answer = "Here you go: [{\"date\":\"2024-07-03\",\"occupancy\":50,\"adr\":99,\"recommendedRate\":105}] Good luck!";
        assert_eq!(parse_forecast(answer).unwrap()[0].date, date(3));
    }

    #[test]
    fn rejects_answers_without_an_array() {
        assert!(matches!(parse_forecast("I cannot help with that."), Err(AppError::ExternalService(_))));
        assert!(matches!(parse_forecast("[{\"date\": 5}]"), Err(AppError::ExternalService(_))));
    }

    #[test]
    fn prompt_names_the_window() {
        let hotel = Hotel {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Seaside".into(),
            code: None,
            city: Some("Lisbon".into()),
            country: None,
            total_rooms: 80,
            currency: "EUR".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let market = BTreeMap::from([(date(5), dec("140"))]);
        let prompt = build_prompt(&hotel, date(1), 7, &[], &market);
        assert!(prompt.contains("Seaside (80 rooms, prices in EUR)"));
        assert!(prompt.contains("from 2024-07-01 to 2024-07-07 (7 days)"));
        assert!(prompt.contains("2024-07-05, 140"));
        assert!(prompt.contains("no saved booking data"));
    }
}
