// src/handlers/hotels.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        rbac::{PermHotelsCreate, PermHotelsDelete, PermHotelsUpdate, PermHotelsView, RequirePermission},
        tenancy::CompanyContext,
    },
    models::hotel::{
        Hotel, HotelDetail, HotelPayload, RateCategory, RateCategoryPayload, RoomType, RoomTypePayload,
    },
};

// ---
// Hotels
// ---

#[utoipa::path(
    get,
    path = "/api/hotels",
    tag = "Hotels",
    responses((status = 200, body = Vec<Hotel>)),
    params(("x-company-id" = Option<Uuid>, Header, description = "Company (superadmin only)")),
    security(("api_jwt" = []))
)]
pub async fn list_hotels(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsView>,
    CompanyContext(company_id): CompanyContext,
) -> Result<Json<Vec<Hotel>>, AppError> {
    Ok(Json(app_state.hotel_service.list(company_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/hotels/{id}",
    tag = "Hotels",
    responses((status = 200, description = "Hotel with room types and rate categories", body = HotelDetail)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn get_hotel(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<HotelDetail>, AppError> {
    Ok(Json(app_state.hotel_service.detail(company_id, hotel_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/hotels",
    tag = "Hotels",
    request_body = HotelPayload,
    responses((status = 201, body = Hotel)),
    security(("api_jwt" = []))
)]
pub async fn create_hotel(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsCreate>,
    CompanyContext(company_id): CompanyContext,
    Json(payload): Json<HotelPayload>,
) -> Result<(StatusCode, Json<Hotel>), AppError> {
    payload.validate()?;
    let hotel = app_state.hotel_service.create(company_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(hotel)))
}

#[utoipa::path(
    put,
    path = "/api/hotels/{id}",
    tag = "Hotels",
    request_body = HotelPayload,
    responses((status = 200, body = Hotel)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn update_hotel(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Json(payload): Json<HotelPayload>,
) -> Result<Json<Hotel>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.hotel_service.update(company_id, hotel_id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/hotels/{id}",
    tag = "Hotels",
    responses((status = 204, description = "Hotel and its dependents deleted")),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn delete_hotel(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsDelete>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.hotel_service.delete(company_id, hotel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Room types
// ---

#[utoipa::path(
    get,
    path = "/api/hotels/{id}/room-types",
    tag = "Hotels",
    responses((status = 200, body = Vec<RoomType>)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn list_room_types(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<Vec<RoomType>>, AppError> {
    Ok(Json(app_state.hotel_service.list_room_types(company_id, hotel_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/hotels/{id}/room-types",
    tag = "Hotels",
    request_body = RoomTypePayload,
    responses((status = 201, body = RoomType)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn create_room_type(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsCreate>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Json(payload): Json<RoomTypePayload>,
) -> Result<(StatusCode, Json<RoomType>), AppError> {
    payload.validate()?;
    let room_type = app_state
        .hotel_service
        .create_room_type(company_id, hotel_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(room_type)))
}

#[utoipa::path(
    put,
    path = "/api/hotels/{id}/room-types/{room_type_id}",
    tag = "Hotels",
    request_body = RoomTypePayload,
    responses((status = 200, body = RoomType)),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("room_type_id" = Uuid, Path, description = "Room type id")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_room_type(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, room_type_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RoomTypePayload>,
) -> Result<Json<RoomType>, AppError> {
    payload.validate()?;
    let room_type = app_state
        .hotel_service
        .update_room_type(company_id, hotel_id, room_type_id, &payload)
        .await?;
    Ok(Json(room_type))
}

#[utoipa::path(
    delete,
    path = "/api/hotels/{id}/room-types/{room_type_id}",
    tag = "Hotels",
    responses((status = 204, description = "Room type deleted")),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("room_type_id" = Uuid, Path, description = "Room type id")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_room_type(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsDelete>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, room_type_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .hotel_service
        .delete_room_type(company_id, hotel_id, room_type_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Rate categories
// ---

#[utoipa::path(
    get,
    path = "/api/hotels/{id}/rate-categories",
    tag = "Hotels",
    responses((status = 200, body = Vec<RateCategory>)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn list_rate_categories(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
) -> Result<Json<Vec<RateCategory>>, AppError> {
    Ok(Json(app_state.hotel_service.list_rate_categories(company_id, hotel_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/hotels/{id}/rate-categories",
    tag = "Hotels",
    request_body = RateCategoryPayload,
    responses((status = 201, body = RateCategory)),
    params(("id" = Uuid, Path, description = "Hotel id")),
    security(("api_jwt" = []))
)]
pub async fn create_rate_category(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsCreate>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Json(payload): Json<RateCategoryPayload>,
) -> Result<(StatusCode, Json<RateCategory>), AppError> {
    payload.validate()?;
    let category = app_state
        .hotel_service
        .create_rate_category(company_id, hotel_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/api/hotels/{id}/rate-categories/{category_id}",
    tag = "Hotels",
    request_body = RateCategoryPayload,
    responses((status = 200, body = RateCategory)),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("category_id" = Uuid, Path, description = "Rate category id")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_rate_category(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsUpdate>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, category_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RateCategoryPayload>,
) -> Result<Json<RateCategory>, AppError> {
    payload.validate()?;
    let category = app_state
        .hotel_service
        .update_rate_category(company_id, hotel_id, category_id, &payload)
        .await?;
    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/api/hotels/{id}/rate-categories/{category_id}",
    tag = "Hotels",
    responses((status = 204, description = "Rate category deleted")),
    params(
        ("id" = Uuid, Path, description = "Hotel id"),
        ("category_id" = Uuid, Path, description = "Rate category id")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_rate_category(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermHotelsDelete>,
    CompanyContext(company_id): CompanyContext,
    Path((hotel_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .hotel_service
        .delete_rate_category(company_id, hotel_id, category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
