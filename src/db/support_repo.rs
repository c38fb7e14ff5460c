// src/db/support_repo.rs

use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::support::{SupportTicket, SupportTicketThread, TicketPriority, TicketStatus},
};

/// Which tickets a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    Company(Uuid),
    Owner(Uuid),
}

#[derive(Clone)]
pub struct SupportRepository {
    pool: PgPool,
}

impl SupportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_ticket(
        &self,
        conn: &mut PgConnection,
        company_id: Option<Uuid>,
        user_id: Uuid,
        subject: &str,
        priority: TicketPriority,
    ) -> Result<SupportTicket, AppError> {
        let ticket = sqlx::query_as::<_, SupportTicket>(
            r#"
            INSERT INTO support_tickets (company_id, user_id, subject, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(subject)
        .bind(priority)
        .fetch_one(&mut *conn)
        .await?;
        Ok(ticket)
    }

    pub async fn add_message(
        &self,
        conn: &mut PgConnection,
        ticket_id: Uuid,
        sender_id: Uuid,
        message: &str,
        attachments: &[String],
    ) -> Result<SupportTicketThread, AppError> {
        let thread = sqlx::query_as::<_, SupportTicketThread>(
            r#"
            INSERT INTO support_ticket_threads (ticket_id, sender_id, message, attachments)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(sender_id)
        .bind(message)
        .bind(Json(attachments))
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("UPDATE support_tickets SET updated_at = NOW() WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *conn)
            .await?;
        Ok(thread)
    }

    pub async fn list_tickets(
        &self,
        scope: TicketScope,
        status: Option<TicketStatus>,
    ) -> Result<Vec<SupportTicket>, AppError> {
        let (company_id, owner_id) = match scope {
            TicketScope::All => (None, None),
            TicketScope::Company(id) => (Some(id), None),
            TicketScope::Owner(id) => (None, Some(id)),
        };

        let tickets = sqlx::query_as::<_, SupportTicket>(
            r#"
            SELECT * FROM support_tickets
            WHERE ($1::uuid IS NULL OR company_id = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::ticket_status IS NULL OR status = $3)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(company_id)
        .bind(owner_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    pub async fn find_ticket(&self, ticket_id: Uuid) -> Result<Option<SupportTicket>, AppError> {
        let ticket = sqlx::query_as::<_, SupportTicket>("SELECT * FROM support_tickets WHERE id = $1")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    pub async fn list_thread(&self, ticket_id: Uuid) -> Result<Vec<SupportTicketThread>, AppError> {
        let thread = sqlx::query_as::<_, SupportTicketThread>(
            "SELECT * FROM support_ticket_threads WHERE ticket_id = $1 ORDER BY created_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(thread)
    }

    pub async fn set_status(&self, ticket_id: Uuid, status: TicketStatus) -> Result<SupportTicket, AppError> {
        sqlx::query_as::<_, SupportTicket>(
            "UPDATE support_tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(ticket_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Ticket"))
    }

    /// Deletes the ticket and its messages; returns the attachment paths the
    /// messages referenced so the caller can remove the files.
    pub async fn delete_cascade(
        &self,
        conn: &mut PgConnection,
        ticket_id: Uuid,
    ) -> Result<Vec<String>, AppError> {
        let removed: Vec<Json<Vec<String>>> = sqlx::query_scalar(
            "DELETE FROM support_ticket_threads WHERE ticket_id = $1 RETURNING attachments",
        )
        .bind(ticket_id)
        .fetch_all(&mut *conn)
        .await?;

        let result = sqlx::query("DELETE FROM support_tickets WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ticket"));
        }

        Ok(flatten_attachments(removed))
    }
}

/// Attachment paths of every removed message, in message order.
pub fn flatten_attachments(messages: Vec<Json<Vec<String>>>) -> Vec<String> {
    messages.into_iter().flat_map(|Json(paths)| paths).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_message_attachment_is_released() {
        let messages = vec![
            Json(vec!["support/a.png".to_string()]),
            Json(vec![]),
            Json(vec!["support/b.pdf".to_string(), "support/c.txt".to_string()]),
        ];
        assert_eq!(
            flatten_attachments(messages),
            vec!["support/a.png", "support/b.pdf", "support/c.txt"]
        );
    }
}
