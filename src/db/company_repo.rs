// src/db/company_repo.rs

use sqlx::{types::Json, Executor, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, db::support_repo::flatten_attachments, models::company::Company};

#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_company<'e, E>(
        &self,
        executor: E,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Company, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, email, phone, address)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(address)
        .fetch_one(executor)
        .await?;
        Ok(company)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    pub async fn list_all(&self) -> Result<Vec<Company>, AppError> {
        let companies = sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(companies)
    }

    pub async fn update_company(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Company, AppError> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(address)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Company"))
    }

    pub async fn count_hotels(&self, id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hotels WHERE company_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Removes the company with everything that hangs off its users and
    /// returns the stored files (ticket attachments, profile images) the
    /// deleted rows referenced. Callers make sure no hotels remain and run
    /// this inside a transaction.
    pub async fn delete_company(&self, conn: &mut PgConnection, id: Uuid) -> Result<Vec<String>, AppError> {
        let statements = [
            "DELETE FROM payments WHERE company_id = $1",
            "DELETE FROM user_subscriptions WHERE company_id = $1",
            "DELETE FROM uploaded_extract_data_files WHERE company_id = $1",
            "DELETE FROM meta_upload_data WHERE upload_data_id IN (SELECT id FROM upload_data WHERE company_id = $1)",
            "DELETE FROM upload_data WHERE company_id = $1",
        ];
        for statement in statements {
            sqlx::query(statement).bind(id).execute(&mut *conn).await?;
        }

        let attachments: Vec<Json<Vec<String>>> = sqlx::query_scalar(
            "DELETE FROM support_ticket_threads WHERE ticket_id IN (SELECT id FROM support_tickets WHERE company_id = $1) RETURNING attachments",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM support_tickets WHERE company_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let profile_images: Vec<Option<String>> =
            sqlx::query_scalar("DELETE FROM users WHERE company_id = $1 RETURNING profile_image")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;

        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Company"));
        }

        let mut files = flatten_attachments(attachments);
        files.extend(profile_images.into_iter().flatten());
        Ok(files)
    }
}
