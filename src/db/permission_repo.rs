// src/db/permission_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::permission::{ModuleGrant, PermissionModule, UserPermission},
};

#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserPermission>, AppError> {
        let permissions = sqlx::query_as::<_, UserPermission>(
            "SELECT * FROM user_permissions WHERE user_id = $1 ORDER BY module",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    pub async fn find_for_module(
        &self,
        user_id: Uuid,
        module: PermissionModule,
    ) -> Result<Option<UserPermission>, AppError> {
        let permission = sqlx::query_as::<_, UserPermission>(
            "SELECT * FROM user_permissions WHERE user_id = $1 AND module = $2",
        )
        .bind(user_id)
        .bind(module)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    pub async fn delete_for_user<'e, E>(&self, executor: E, user_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Bulk upsert of one row per module.
    pub async fn upsert_grants<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        grants: &[ModuleGrant],
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if grants.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO user_permissions (user_id, module, can_view, can_create, can_update, can_delete) ",
        );
        builder.push_values(grants, |mut row, grant| {
            row.push_bind(user_id)
                .push_bind(grant.module)
                .push_bind(grant.can_view)
                .push_bind(grant.can_create)
                .push_bind(grant.can_update)
                .push_bind(grant.can_delete);
        });
        builder.push(
            r#"
            ON CONFLICT (user_id, module) DO UPDATE
            SET can_view = EXCLUDED.can_view,
                can_create = EXCLUDED.can_create,
                can_update = EXCLUDED.can_update,
                can_delete = EXCLUDED.can_delete
            "#,
        );

        builder.build().execute(executor).await?;
        Ok(())
    }
}
