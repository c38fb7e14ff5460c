// src/services/notification_service.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::NotificationRepository,
    models::notification::{Notification, UnreadCount},
};

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository) -> Self {
        Self { repo }
    }

    /// Inserts on the caller's executor so the notification commits (or rolls
    /// back) together with the event that caused it.
    pub async fn notify<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<Notification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.create(executor, user_id, title, message, link).await
    }

    pub async fn list(&self, user_id: Uuid, only_unread: bool) -> Result<Vec<Notification>, AppError> {
        self.repo.list(user_id, only_unread).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<UnreadCount, AppError> {
        let unread = self.repo.unread_count(user_id).await?;
        Ok(UnreadCount { unread })
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, AppError> {
        self.repo
            .mark_read(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.repo.mark_all_read(user_id).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        match self.repo.delete(user_id, id).await? {
            0 => Err(AppError::NotFound("Notification")),
            _ => Ok(()),
        }
    }
}
