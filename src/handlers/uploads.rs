// src/handlers/uploads.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::form::FormData,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{
            PermReportsView, PermUploadsCreate, PermUploadsDelete, PermUploadsUpdate, PermUploadsView,
            RequirePermission,
        },
        tenancy::CompanyContext,
    },
    models::upload::{
        implied_report_type, ConfirmUploadPayload, FileType, HotelDataQuery, RowsQuery, UploadAccepted, UploadData, UploadDetail,
        UploadListQuery, UploadedExtractDataFile,
    },
};

#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "Uploads",
    request_body(
        content_type = "multipart/form-data",
        description = "`file` (.csv, .xlsx, .xls), `fileType` (booking | competitor | str | price_data), optional `reportType`"
    ),
    responses(
        (status = 201, description = "File validated and staged", body = UploadAccepted),
        (status = 400, description = "Unsupported file, missing columns or invalid rows")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_file(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsCreate>,
    AuthenticatedUser(user): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAccepted>), AppError> {
    let mut form = FormData::read(multipart).await?;

    let raw_file_type = form.required_text("fileType")?;
    let file_type: FileType = raw_file_type.parse().map_err(AppError::BadRequest)?;
    let report_type = form
        .text("reportType")
        .or_else(|| implied_report_type(raw_file_type))
        .map(str::to_string);
    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::bad_request("The 'file' part is required."))?;
    if file.bytes.is_empty() {
        return Err(AppError::bad_request("The uploaded file is empty."));
    }

    let accepted = app_state
        .upload_service
        .upload(company_id, &user, file.file_name, file.bytes, file_type, report_type.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

#[utoipa::path(
    get,
    path = "/api/uploads",
    tag = "Uploads",
    params(UploadListQuery),
    responses((status = 200, body = Vec<UploadData>)),
    security(("api_jwt" = []))
)]
pub async fn list_uploads(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsView>,
    CompanyContext(company_id): CompanyContext,
    Query(query): Query<UploadListQuery>,
) -> Result<Json<Vec<UploadData>>, AppError> {
    Ok(Json(app_state.upload_service.list(company_id, &query).await?))
}

#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    tag = "Uploads",
    responses((status = 200, body = UploadDetail)),
    params(("id" = Uuid, Path, description = "Upload id")),
    security(("api_jwt" = []))
)]
pub async fn get_upload(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsView>,
    CompanyContext(company_id): CompanyContext,
    Path(upload_id): Path<Uuid>,
) -> Result<Json<UploadDetail>, AppError> {
    Ok(Json(app_state.upload_service.detail(company_id, upload_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/uploads/{id}/rows",
    tag = "Uploads",
    params(("id" = Uuid, Path, description = "Upload id"), RowsQuery),
    responses((status = 200, body = Vec<UploadedExtractDataFile>)),
    security(("api_jwt" = []))
)]
pub async fn list_rows(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsView>,
    CompanyContext(company_id): CompanyContext,
    Path(upload_id): Path<Uuid>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<Vec<UploadedExtractDataFile>>, AppError> {
    Ok(Json(app_state.upload_service.rows(company_id, upload_id, &query).await?))
}

#[utoipa::path(
    post,
    path = "/api/uploads/{id}/confirm",
    tag = "Uploads",
    request_body = ConfirmUploadPayload,
    responses(
        (status = 200, description = "Rows promoted to saved", body = UploadDetail),
        (status = 409, description = "Already confirmed, or the same hotel and dates are already registered")
    ),
    params(("id" = Uuid, Path, description = "Upload id")),
    security(("api_jwt" = []))
)]
pub async fn confirm_upload(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsUpdate>,
    AuthenticatedUser(user): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    Path(upload_id): Path<Uuid>,
    Json(payload): Json<ConfirmUploadPayload>,
) -> Result<Json<UploadDetail>, AppError> {
    let detail = app_state
        .upload_service
        .confirm(company_id, &user, upload_id, &payload)
        .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/uploads/{id}",
    tag = "Uploads",
    responses((status = 204, description = "Batch, metadata and rows deleted")),
    params(("id" = Uuid, Path, description = "Upload id")),
    security(("api_jwt" = []))
)]
pub async fn delete_upload(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermUploadsDelete>,
    CompanyContext(company_id): CompanyContext,
    Path(upload_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.upload_service.delete(company_id, upload_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/hotels/{id}/data",
    tag = "Uploads",
    params(("id" = Uuid, Path, description = "Hotel id"), HotelDataQuery),
    responses((status = 200, description = "Saved rows for the hotel", body = Vec<UploadedExtractDataFile>)),
    security(("api_jwt" = []))
)]
pub async fn hotel_data(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermReportsView>,
    CompanyContext(company_id): CompanyContext,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<HotelDataQuery>,
) -> Result<Json<Vec<UploadedExtractDataFile>>, AppError> {
    Ok(Json(app_state.upload_service.hotel_data(company_id, hotel_id, &query).await?))
}
