// src/handlers/permissions.rs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{AdminOnly, RequireRole},
    },
    models::permission::{ModuleGrant, ReplacePermissionsPayload},
};

#[utoipa::path(
    get,
    path = "/api/permissions/me",
    tag = "Permissions",
    responses((status = 200, description = "One entry per module", body = Vec<ModuleGrant>)),
    security(("api_jwt" = []))
)]
pub async fn list_mine(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ModuleGrant>>, AppError> {
    Ok(Json(app_state.permission_service.list_own(user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/permissions/users/{id}",
    tag = "Permissions",
    responses((status = 200, body = Vec<ModuleGrant>), (status = 404, description = "User not found")),
    params(("id" = Uuid, Path, description = "User id")),
    security(("api_jwt" = []))
)]
pub async fn list_for_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ModuleGrant>>, AppError> {
    Ok(Json(app_state.permission_service.list_for_user(&actor, user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/permissions/users/{id}",
    tag = "Permissions",
    request_body = ReplacePermissionsPayload,
    responses((status = 200, description = "The full new grant set", body = Vec<ModuleGrant>)),
    params(("id" = Uuid, Path, description = "User id")),
    security(("api_jwt" = []))
)]
pub async fn replace_for_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ReplacePermissionsPayload>,
) -> Result<Json<Vec<ModuleGrant>>, AppError> {
    let grants = app_state
        .permission_service
        .replace(&actor, user_id, &payload.permissions)
        .await?;
    Ok(Json(grants))
}
