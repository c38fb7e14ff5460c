// src/handlers/users.rs

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
        auth::AuthenticatedUser,
        rbac::{AdminOnly, RequireRole, SuperAdminOnly},
        tenancy::CompanyContext,
    },
    models::{
        auth::User,
        company::{Company, CreateCompanyPayload, CreateUserPayload, UpdateCompanyPayload, UpdateUserPayload},
    },
};

// ---
// Company users (admins)
// ---

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses((status = 200, description = "Users of the company", body = Vec<User>)),
    params(("x-company-id" = Option<Uuid>, Header, description = "Company (superadmin only)")),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    CompanyContext(company_id): CompanyContext,
) -> Result<Json<Vec<User>>, AppError> {
    let users = app_state.user_service.list_users(company_id).await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    responses((status = 200, body = User), (status = 404, description = "User not found")),
    params(("id" = Uuid, Path, description = "User id")),
    security(("api_jwt" = []))
)]
pub async fn get_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    CompanyContext(company_id): CompanyContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = app_state.user_service.get_user(company_id, user_id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created; the temporary password is e-mailed", body = User),
        (status = 409, description = "E-mail already in use")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(actor): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    Json(payload): Json<CreateUserPayload>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.validate()?;
    let user = app_state.user_service.create_user(&actor, company_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    request_body = UpdateUserPayload,
    responses((status = 200, body = User)),
    params(("id" = Uuid, Path, description = "User id")),
    security(("api_jwt" = []))
)]
pub async fn update_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(actor): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<User>, AppError> {
    payload.validate()?;
    let user = app_state
        .user_service
        .update_user(&actor, company_id, user_id, &payload)
        .await?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    responses((status = 204, description = "User deleted"), (status = 400, description = "Cannot delete yourself")),
    params(("id" = Uuid, Path, description = "User id")),
    security(("api_jwt" = []))
)]
pub async fn delete_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(actor): AuthenticatedUser,
    CompanyContext(company_id): CompanyContext,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.user_service.delete_user(&actor, company_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Companies (superadmin)
// ---

#[utoipa::path(
    get,
    path = "/api/companies",
    tag = "Companies",
    responses((status = 200, body = Vec<Company>)),
    security(("api_jwt" = []))
)]
pub async fn list_companies(
    State(app_state): State<AppState>,
    _guard: RequireRole<SuperAdminOnly>,
) -> Result<Json<Vec<Company>>, AppError> {
    Ok(Json(app_state.user_service.list_companies().await?))
}

#[utoipa::path(
    get,
    path = "/api/companies/{id}",
    tag = "Companies",
    responses((status = 200, body = Company)),
    params(("id" = Uuid, Path, description = "Company id")),
    security(("api_jwt" = []))
)]
pub async fn get_company(
    State(app_state): State<AppState>,
    _guard: RequireRole<SuperAdminOnly>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Company>, AppError> {
    Ok(Json(app_state.user_service.get_company(company_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/companies",
    tag = "Companies",
    request_body = CreateCompanyPayload,
    responses((status = 201, body = Company)),
    security(("api_jwt" = []))
)]
pub async fn create_company(
    State(app_state): State<AppState>,
    _guard: RequireRole<SuperAdminOnly>,
    Json(payload): Json<CreateCompanyPayload>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    payload.validate()?;
    let company = app_state.user_service.create_company(&payload).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    put,
    path = "/api/companies/{id}",
    tag = "Companies",
    request_body = UpdateCompanyPayload,
    responses((status = 200, body = Company)),
    params(("id" = Uuid, Path, description = "Company id")),
    security(("api_jwt" = []))
)]
pub async fn update_company(
    State(app_state): State<AppState>,
    _guard: RequireRole<SuperAdminOnly>,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<Json<Company>, AppError> {
    payload.validate()?;
    let company = app_state.user_service.update_company(company_id, &payload).await?;
    Ok(Json(company))
}

#[utoipa::path(
    delete,
    path = "/api/companies/{id}",
    tag = "Companies",
    responses(
        (status = 204, description = "Company deleted"),
        (status = 409, description = "The company still owns hotels")
    ),
    params(("id" = Uuid, Path, description = "Company id")),
    security(("api_jwt" = []))
)]
pub async fn delete_company(
    State(app_state): State<AppState>,
    _guard: RequireRole<SuperAdminOnly>,
    Path(company_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.user_service.delete_company(company_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
