// src/models/support.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "ticket_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub user_id: Uuid,
    pub subject: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicketThread {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    /// Paths relative to the upload directory.
    #[schema(value_type = Vec<String>)]
    pub attachments: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub thread: Vec<SupportTicketThread>,
}

/// A file received in a multipart request, not yet written to disk.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct NewTicket {
    pub subject: String,
    pub message: String,
    pub priority: TicketPriority,
    pub attachments: Vec<IncomingFile>,
}

#[derive(Debug)]
pub struct NewReply {
    pub message: String,
    pub attachments: Vec<IncomingFile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTicketStatusPayload {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
}
