// src/handlers/notifications.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::notification::{Notification, NotificationQuery, UnreadCount},
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    params(NotificationQuery),
    responses((status = 200, body = Vec<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let only_unread = query.unread.unwrap_or(false);
    Ok(Json(app_state.notification_service.list(user.id, only_unread).await?))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "Notifications",
    responses((status = 200, body = UnreadCount)),
    security(("api_jwt" = []))
)]
pub async fn unread_count(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCount>, AppError> {
    Ok(Json(app_state.notification_service.unread_count(user.id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    responses((status = 200, body = Notification), (status = 404, description = "Not one of your notifications")),
    params(("id" = Uuid, Path, description = "Notification id")),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(app_state.notification_service.mark_read(user.id, notification_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    responses((status = 200, description = "`{ updated }` rows marked read")),
    security(("api_jwt" = []))
)]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Value>, AppError> {
    let updated = app_state.notification_service.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "Notifications",
    responses((status = 204, description = "Deleted")),
    params(("id" = Uuid, Path, description = "Notification id")),
    security(("api_jwt" = []))
)]
pub async fn delete_notification(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.notification_service.delete(user.id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
