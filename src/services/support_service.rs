// src/services/support_service.rs

use std::{path::PathBuf, sync::Arc};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        files::{remove_after_commit, remove_stored_files, store_file},
    },
    db::{support_repo::TicketScope, SupportRepository, UserRepository},
    models::{
        auth::{User, UserRole},
        support::{IncomingFile, NewReply, NewTicket, SupportTicket, TicketDetail, TicketStatus},
    },
    services::{
        mail::{spawn_send, Mailer, OutgoingMail},
        notification_service::NotificationService,
    },
};

const ATTACHMENT_DIR: &str = "support";
const MAX_ATTACHMENTS: usize = 5;

/// Superadmins see every ticket, admins their company's, users their own.
pub fn scope_for(user: &User) -> TicketScope {
    match (user.role, user.company_id) {
        (UserRole::SuperAdmin, _) => TicketScope::All,
        (UserRole::Admin, Some(company_id)) => TicketScope::Company(company_id),
        _ => TicketScope::Owner(user.id),
    }
}

pub fn can_access(user: &User, ticket: &SupportTicket) -> bool {
    match scope_for(user) {
        TicketScope::All => true,
        TicketScope::Company(company_id) => ticket.company_id == Some(company_id),
        TicketScope::Owner(user_id) => ticket.user_id == user_id,
    }
}

/// Owners may close their own ticket; any other transition is staff work.
fn ensure_can_set_status(user: &User, status: TicketStatus) -> Result<(), AppError> {
    if user.role.is_admin() || status == TicketStatus::Closed {
        Ok(())
    } else {
        Err(AppError::forbidden("Only administrators can reopen or progress a ticket."))
    }
}

fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{} is required.", field)));
    }
    Ok(value.to_string())
}

#[derive(Clone)]
pub struct SupportService {
    repo: SupportRepository,
    user_repo: UserRepository,
    notifications: NotificationService,
    mailer: Arc<dyn Mailer>,
    upload_dir: PathBuf,
    pool: PgPool,
}

impl SupportService {
    pub fn new(
        repo: SupportRepository,
        user_repo: UserRepository,
        notifications: NotificationService,
        mailer: Arc<dyn Mailer>,
        upload_dir: PathBuf,
        pool: PgPool,
    ) -> Self {
        Self { repo, user_repo, notifications, mailer, upload_dir, pool }
    }

    async fn store_attachments(&self, files: &[IncomingFile]) -> Result<Vec<String>, AppError> {
        if files.len() > MAX_ATTACHMENTS {
            return Err(AppError::bad_request(format!(
                "At most {} attachments are allowed per message.",
                MAX_ATTACHMENTS
            )));
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files.iter().filter(|f| !f.bytes.is_empty()) {
            match store_file(&self.upload_dir, ATTACHMENT_DIR, &file.file_name, &file.bytes).await {
                Ok(path) => stored.push(path),
                Err(e) => {
                    remove_stored_files(&self.upload_dir, &stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn accessible_ticket(&self, user: &User, ticket_id: Uuid) -> Result<SupportTicket, AppError> {
        self.repo
            .find_ticket(ticket_id)
            .await?
            .filter(|ticket| can_access(user, ticket))
            .ok_or(AppError::NotFound("Ticket"))
    }

    /// The people on the other side of a message: staff when the owner
    /// writes, the owner otherwise.
    async fn counterparts(&self, sender: &User, ticket: &SupportTicket) -> Result<Vec<User>, AppError> {
        if sender.id != ticket.user_id {
            return Ok(self.user_repo.find_by_id(ticket.user_id).await?.into_iter().collect());
        }
        let Some(company_id) = ticket.company_id else {
            return Ok(Vec::new());
        };
        let admins = self.user_repo.list_company_admins(company_id).await?;
        Ok(admins.into_iter().filter(|u| u.id != sender.id).collect())
    }

    async fn notify_counterparts(&self, sender: &User, ticket: &SupportTicket, title: &str, message: &str) {
        let recipients = match self.counterparts(sender, ticket).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(ticket_id = %ticket.id, "Could not resolve ticket recipients: {}", e);
                return;
            }
        };

        let link = format!("/support/{}", ticket.id);
        for recipient in recipients {
            if let Err(e) = self
                .notifications
                .notify(&self.pool, recipient.id, title, message, Some(&link))
                .await
            {
                tracing::error!(ticket_id = %ticket.id, user_id = %recipient.id, "Notification failed: {}", e);
            }

            spawn_send(
                self.mailer.clone(),
                OutgoingMail {
                    to: recipient.email.clone(),
                    subject: format!("[Support] {}", ticket.subject),
                    body: format!("Hello {},\n\n{}\n\n{}", recipient.name, message, sender.name),
                },
            );
        }
    }

    pub async fn list(&self, user: &User, status: Option<TicketStatus>) -> Result<Vec<SupportTicket>, AppError> {
        self.repo.list_tickets(scope_for(user), status).await
    }

    pub async fn detail(&self, user: &User, ticket_id: Uuid) -> Result<TicketDetail, AppError> {
        let ticket = self.accessible_ticket(user, ticket_id).await?;
        let thread = self.repo.list_thread(ticket.id).await?;
        Ok(TicketDetail { ticket, thread })
    }

    pub async fn create(&self, user: &User, new: NewTicket) -> Result<TicketDetail, AppError> {
        let subject = required_text(&new.subject, "subject")?;
        let message = required_text(&new.message, "message")?;
        let attachments = self.store_attachments(&new.attachments).await?;

        let result = async {
            let mut tx = self.pool.begin().await?;
            let ticket = self
                .repo
                .create_ticket(&mut tx, user.company_id, user.id, &subject, new.priority)
                .await?;
            let first = self.repo.add_message(&mut tx, ticket.id, user.id, &message, &attachments).await?;
            tx.commit().await?;
            Ok::<_, AppError>(TicketDetail { ticket, thread: vec![first] })
        }
        .await;

        let detail = match result {
            Ok(detail) => detail,
            Err(e) => {
                remove_stored_files(&self.upload_dir, &attachments).await;
                return Err(e);
            }
        };

        tracing::info!(ticket_id = %detail.ticket.id, user_id = %user.id, "🎫 Support ticket opened");

        self.notify_counterparts(
            user,
            &detail.ticket,
            "New support ticket",
            &format!("{} opened \"{}\".", user.name, detail.ticket.subject),
        )
        .await;

        Ok(detail)
    }

    pub async fn reply(&self, user: &User, ticket_id: Uuid, reply: NewReply) -> Result<TicketDetail, AppError> {
        let ticket = self.accessible_ticket(user, ticket_id).await?;
        let message = required_text(&reply.message, "message")?;
        let attachments = self.store_attachments(&reply.attachments).await?;

        let result = async {
            let mut tx = self.pool.begin().await?;
            self.repo.add_message(&mut tx, ticket.id, user.id, &message, &attachments).await?;
            tx.commit().await?;
            Ok::<_, AppError>(())
        }
        .await;
        if let Err(e) = result {
            remove_stored_files(&self.upload_dir, &attachments).await;
            return Err(e);
        }

        self.notify_counterparts(
            user,
            &ticket,
            "New reply on your ticket",
            &format!("{} replied to \"{}\":\n\n{}", user.name, ticket.subject, message),
        )
        .await;

        self.detail(user, ticket.id).await
    }

    pub async fn set_status(&self, user: &User, ticket_id: Uuid, status: TicketStatus) -> Result<SupportTicket, AppError> {
        let ticket = self.accessible_ticket(user, ticket_id).await?;
        ensure_can_set_status(user, status)?;

        let updated = self.repo.set_status(ticket.id, status).await?;
        tracing::info!(ticket_id = %ticket.id, status = ?status, "Ticket status changed");

        if user.id != ticket.user_id {
            let link = format!("/support/{}", ticket.id);
            self.notifications
                .notify(
                    &self.pool,
                    ticket.user_id,
                    "Ticket updated",
                    &format!("\"{}\" is now {:?}.", ticket.subject, status),
                    Some(&link),
                )
                .await?;
        }
        Ok(updated)
    }

    /// Rows go first inside a transaction; files are only removed after the
    /// commit succeeded.
    pub async fn delete(&self, user: &User, ticket_id: Uuid) -> Result<(), AppError> {
        let ticket = self.accessible_ticket(user, ticket_id).await?;

        let committed = async {
            let mut tx = self.pool.begin().await?;
            let files = self.repo.delete_cascade(&mut tx, ticket.id).await?;
            tx.commit().await?;
            Ok::<_, AppError>(files)
        }
        .await;

        let removed = remove_after_commit(&self.upload_dir, committed).await?;
        tracing::info!(ticket_id = %ticket.id, removed, "Ticket deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::support::TicketPriority;
    use chrono::Utc;

    fn ticket(company_id: Option<Uuid>, user_id: Uuid) -> SupportTicket {
        SupportTicket {
            id: Uuid::new_v4(),
            company_id,
            user_id,
            subject: "Upload stuck".into(),
            priority: TicketPriority::Medium,
            status: TicketStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn visibility_follows_the_role() {
        let company = Uuid::new_v4();
        let owner = User::fixture(UserRole::User, Some(company));
        let colleague = User::fixture(UserRole::User, Some(company));
        let admin = User::fixture(UserRole::Admin, Some(company));
        let foreign_admin = User::fixture(UserRole::Admin, Some(Uuid::new_v4()));
        let root = User::fixture(UserRole::SuperAdmin, None);

        let t = ticket(Some(company), owner.id);
        assert!(can_access(&owner, &t));
        assert!(!can_access(&colleague, &t));
        assert!(can_access(&admin, &t));
        assert!(!can_access(&foreign_admin, &t));
        assert!(can_access(&root, &t));

        assert_eq!(scope_for(&owner), TicketScope::Owner(owner.id));
        assert_eq!(scope_for(&admin), TicketScope::Company(company));
        assert_eq!(scope_for(&root), TicketScope::All);
    }

    #[test]
    fn owners_may_only_close() {
        let user = User::fixture(UserRole::User, Some(Uuid::new_v4()));
        assert!(ensure_can_set_status(&user, TicketStatus::Closed).is_ok());
        assert!(ensure_can_set_status(&user, TicketStatus::Open).is_err());

        let admin = User::fixture(UserRole::Admin, Some(Uuid::new_v4()));
        assert!(ensure_can_set_status(&admin, TicketStatus::InProgress).is_ok());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(required_text("   ", "subject").is_err());
        assert_eq!(required_text("  Help \n", "subject").unwrap(), "Help");
    }
}
