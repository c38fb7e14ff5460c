// src/handlers/support.rs

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
        rbac::{PermSupportCreate, PermSupportDelete, PermSupportUpdate, PermSupportView, RequirePermission},
    },
    models::support::{
        NewReply, NewTicket, SupportTicket, TicketDetail, TicketListQuery, TicketPriority,
        UpdateTicketStatusPayload,
    },
};

fn parse_priority(raw: Option<&str>) -> Result<TicketPriority, AppError> {
    match raw.map(str::to_lowercase).as_deref() {
        None | Some("medium") => Ok(TicketPriority::Medium),
        Some("low") => Ok(TicketPriority::Low),
        Some("high") => Ok(TicketPriority::High),
        Some(other) => Err(AppError::bad_request(format!(
            "Unknown priority '{}'; use low, medium or high.",
            other
        ))),
    }
}

#[utoipa::path(
    post,
    path = "/api/support/tickets",
    tag = "Support",
    request_body(
        content_type = "multipart/form-data",
        description = "`subject`, `message`, `priority` (low | medium | high), `attachments[]`"
    ),
    responses((status = 201, body = TicketDetail)),
    security(("api_jwt" = []))
)]
pub async fn create_ticket(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportCreate>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TicketDetail>), AppError> {
    let mut form = FormData::read(multipart).await?;
    let new = NewTicket {
        subject: form.required_text("subject")?.to_string(),
        message: form.required_text("message")?.to_string(),
        priority: parse_priority(form.text("priority"))?,
        attachments: form.take_files("attachments"),
    };

    let detail = app_state.support_service.create(&user, new).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/support/tickets",
    tag = "Support",
    params(TicketListQuery),
    responses((status = 200, description = "Tickets visible to the caller", body = Vec<SupportTicket>)),
    security(("api_jwt" = []))
)]
pub async fn list_tickets(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportView>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<Vec<SupportTicket>>, AppError> {
    Ok(Json(app_state.support_service.list(&user, query.status).await?))
}

#[utoipa::path(
    get,
    path = "/api/support/tickets/{id}",
    tag = "Support",
    responses((status = 200, body = TicketDetail)),
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("api_jwt" = []))
)]
pub async fn get_ticket(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportView>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketDetail>, AppError> {
    Ok(Json(app_state.support_service.detail(&user, ticket_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/support/tickets/{id}/messages",
    tag = "Support",
    request_body(content_type = "multipart/form-data", description = "`message`, `attachments[]`"),
    responses((status = 201, description = "Reply added", body = TicketDetail)),
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("api_jwt" = []))
)]
pub async fn reply_ticket(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportCreate>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TicketDetail>), AppError> {
    let mut form = FormData::read(multipart).await?;
    let reply = NewReply {
        message: form.required_text("message")?.to_string(),
        attachments: form.take_files("attachments"),
    };

    let detail = app_state.support_service.reply(&user, ticket_id, reply).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    patch,
    path = "/api/support/tickets/{id}/status",
    tag = "Support",
    request_body = UpdateTicketStatusPayload,
    responses((status = 200, body = SupportTicket)),
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("api_jwt" = []))
)]
pub async fn update_ticket_status(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportUpdate>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<UpdateTicketStatusPayload>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = app_state
        .support_service
        .set_status(&user, ticket_id, payload.status)
        .await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    delete,
    path = "/api/support/tickets/{id}",
    tag = "Support",
    responses((status = 204, description = "Ticket, thread and attachments deleted")),
    params(("id" = Uuid, Path, description = "Ticket id")),
    security(("api_jwt" = []))
)]
pub async fn delete_ticket(
    State(app_state): State<AppState>,
    _guard: RequirePermission<PermSupportDelete>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.support_service.delete(&user, ticket_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(parse_priority(None).unwrap(), TicketPriority::Medium);
        assert_eq!(parse_priority(Some("HIGH")).unwrap(), TicketPriority::High);
        assert!(matches!(parse_priority(Some("urgent")), Err(AppError::BadRequest(_))));
    }
}
