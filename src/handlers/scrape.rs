// src/handlers/scrape.rs

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        rbac::{PermScrapingUpdate, PermScrapingView, RequirePermission},
        tenancy::CompanyContext,
    },
    models::scrape::{
        RatesQuery, ScrapeRunPayload, ScrapeRunSummary, ScrapeSourceHotel, ScrapeSourcePayload, ScrapedRate,
    },
    services::scrape_service::check_scrape_secret,
};

const SCRAPE_SECRET_HEADER: &str = "x-scrape-secret";

#[utoipa::path(
    get,
    path = "/api/hotels/{id}/sources",
    tag = "Scraping",
    responses((status = 200, body = Vec<ScrapeSourceHotel>)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn list_sources(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermScrapingView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<Vec<ScrapeSourceHotel>>, AppError> {
    Ok(Json(app_state.scrape_service.list_sources(company_id, hotel_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/hotels/{id}/sources",
    tag = "Scraping",
    request_body = ScrapeSourcePayload,
    responses(
        (status = 201, body = ScrapeSourceHotel),
        (status = 409, description = "The hotel already has a mapping for this source")
    ),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn create_source(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermScrapingUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Json(payload): Json<ScrapeSourcePayload>,
) -> Result<(StatusCode, Json<ScrapeSourceHotel>), AppError> {
    payload.validate()?;
    let source = app_state
        .scrape_service
        .create_source(company_id, hotel_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(source)))
}

#[utoipa::path(
    put,
    path = "/api/hotels/{id}/sources/{source_id}",
    tag = "Scraping",
    request_body = ScrapeSourcePayload,
    responses((status = 200, body = ScrapeSourceHotel)),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("source_id" = Uuid, Path, description = "Mapping id")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_source(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermScrapingUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, source_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ScrapeSourcePayload>,
) -> Result<Json<ScrapeSourceHotel>, AppError> {
    payload.validate()?;
    let source = app_state
        .scrape_service
        .update_source(company_id, hotel_id, source_id, &payload)
        .await?;
    Ok(Json(source))
}

#[utoipa::path(
    delete,
    path = "/api/hotels/{id}/sources/{source_id}",
    tag = "Scraping",
    responses((status = 204, description = "Mapping deleted")),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("source_id" = Uuid, Path, description = "Mapping id")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_source(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermScrapingUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, source_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .scrape_service
        .delete_source(company_id, hotel_id, source_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/hotels/{id}/rates",
    tag = "Scraping",
    params(("id" = Uuid, Path, description = "Hotel id"), RatesQuery),
    responses((status = 200, body = Vec<ScrapedRate>)),
    security(("api_jwt" = []))
)]
pub async fn list_rates(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermScrapingView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<Vec<ScrapedRate>>, AppError> {
    Ok(Json(app_state.scrape_service.list_rates(company_id, hotel_id, &query).await?))
}

// Called by an external scheduler, not by signed-in users
#[utoipa::path(
    post,
    path = "/api/scrape/run",
    tag = "Scraping",
    request_body(content = ScrapeRunPayload, description = "Optional stay window; an empty body means tomorrow, one night"),
    params(("x-scrape-secret" = String, Header, description = "Shared secret")),
    responses(
        (status = 200, body = ScrapeRunSummary),
        (status = 401, description = "Missing or wrong secret"),
        (status = 503, description = "Scraping is not configured")
    )
)]
pub async fn run_scrape(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ScrapeRunSummary>, AppError> {
    let provided = headers.get(SCRAPE_SECRET_HEADER).and_then(|v| v.to_str().ok());
    check_scrape_secret(app_state.config.scrape_secret.as_deref(), provided)?;

    let payload: ScrapeRunPayload = if body.iter().all(u8::is_ascii_whitespace) {
        ScrapeRunPayload::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::bad_request(format!("Invalid JSON body: {}", e)))?
    };
    Ok(Json(app_state.scrape_service.run(&payload).await?))
}
