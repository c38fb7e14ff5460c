// src/services/user_service.rs

use std::{path::PathBuf, sync::Arc};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        files::{remove_after_commit, remove_stored_files},
    },
    db::{CompanyRepository, PermissionRepository, UserRepository},
    models::{
        auth::{User, UserRole},
        company::{Company, CreateCompanyPayload, CreateUserPayload, UpdateCompanyPayload, UpdateUserPayload},
        permission::ModuleGrant,
    },
    services::{
        auth::{hash_password, random_token},
        mail::{spawn_send, Mailer, OutgoingMail},
    },
};

const TEMP_PASSWORD_LEN: usize = 12;

/// Only a superadmin may hand out the superadmin role.
fn ensure_can_assign(actor: &User, role: UserRole) -> Result<(), AppError> {
    if role == UserRole::SuperAdmin && actor.role != UserRole::SuperAdmin {
        return Err(AppError::forbidden("Only a superadmin can assign the superadmin role."));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    company_repo: CompanyRepository,
    permission_repo: PermissionRepository,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    upload_dir: PathBuf,
    pool: PgPool,
}

impl UserService {
    pub fn new(
        user_repo: UserRepository,
        company_repo: CompanyRepository,
        permission_repo: PermissionRepository,
        mailer: Arc<dyn Mailer>,
        frontend_url: String,
        upload_dir: PathBuf,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, company_repo, permission_repo, mailer, frontend_url, upload_dir, pool }
    }

    // =========================================================================
    //  COMPANY USERS
    // =========================================================================

    pub async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, AppError> {
        self.user_repo.list_by_company(company_id).await
    }

    pub async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<User, AppError> {
        self.user_repo
            .find_in_company(user_id, company_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Creates the account with a temporary password that is e-mailed to the
    /// new user, together with the default grants for the role.
    pub async fn create_user(
        &self,
        actor: &User,
        company_id: Uuid,
        payload: &CreateUserPayload,
    ) -> Result<User, AppError> {
        ensure_can_assign(actor, payload.role)?;

        let temp_password = random_token(TEMP_PASSWORD_LEN);
        let password_hash = hash_password(&temp_password).await?;
        let email = payload.email.trim().to_lowercase();

        let mut tx = self.pool.begin().await?;
        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                Some(company_id),
                payload.name.trim(),
                &email,
                &password_hash,
                payload.role,
                payload.phone.as_deref(),
            )
            .await?;
        self.permission_repo
            .upsert_grants(&mut *tx, user.id, &ModuleGrant::defaults_for(user.role))
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, company_id = %company_id, created_by = %actor.id, "User created");

        spawn_send(
            self.mailer.clone(),
            OutgoingMail {
                to: user.email.clone(),
                subject: "Your account has been created".to_string(),
                body: format!(
                    "Hello {},\n\n{} created an account for you.\n\nE-mail: {}\nTemporary password: {}\n\nSign in at {}/login and change your password right away.",
                    user.name, actor.name, user.email, temp_password, self.frontend_url
                ),
            },
        );

        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &User,
        company_id: Uuid,
        user_id: Uuid,
        payload: &UpdateUserPayload,
    ) -> Result<User, AppError> {
        if let Some(role) = payload.role {
            ensure_can_assign(actor, role)?;
        }
        if user_id == actor.id && (payload.is_active == Some(false) || payload.role.is_some_and(|r| r != actor.role)) {
            return Err(AppError::bad_request("You cannot deactivate or demote your own account."));
        }

        self.user_repo
            .update_by_admin(
                user_id,
                company_id,
                payload.name.as_deref().map(str::trim),
                payload.role,
                payload.phone.as_deref(),
                payload.is_active,
            )
            .await
    }

    pub async fn delete_user(&self, actor: &User, company_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if user_id == actor.id {
            return Err(AppError::bad_request("You cannot delete your own account."));
        }
        let profile_image = self.user_repo.delete_in_company(user_id, company_id).await?;
        if let Some(path) = profile_image {
            remove_stored_files(&self.upload_dir, &[path]).await;
        }
        tracing::info!(user_id = %user_id, deleted_by = %actor.id, "User deleted");
        Ok(())
    }

    // =========================================================================
    //  COMPANIES (superadmin)
    // =========================================================================

    pub async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        self.company_repo.list_all().await
    }

    pub async fn get_company(&self, company_id: Uuid) -> Result<Company, AppError> {
        self.company_repo
            .find_by_id(company_id)
            .await?
            .ok_or(AppError::NotFound("Company"))
    }

    pub async fn create_company(&self, payload: &CreateCompanyPayload) -> Result<Company, AppError> {
        self.company_repo
            .create_company(
                &self.pool,
                payload.name.trim(),
                payload.email.as_deref(),
                payload.phone.as_deref(),
                payload.address.as_deref(),
            )
            .await
    }

    pub async fn update_company(&self, company_id: Uuid, payload: &UpdateCompanyPayload) -> Result<Company, AppError> {
        self.company_repo
            .update_company(
                company_id,
                payload.name.as_deref().map(str::trim),
                payload.email.as_deref(),
                payload.phone.as_deref(),
                payload.address.as_deref(),
                payload.is_active,
            )
            .await
    }

    /// Refused while the company still owns hotels.
    pub async fn delete_company(&self, company_id: Uuid) -> Result<(), AppError> {
        let company = self.get_company(company_id).await?;

        let hotels = self.company_repo.count_hotels(company.id).await?;
        if hotels > 0 {
            return Err(AppError::conflict(format!(
                "The company still owns {} hotel(s); delete them first.",
                hotels
            )));
        }

        let committed = async {
            let mut tx = self.pool.begin().await?;
            let files = self.company_repo.delete_company(&mut tx, company.id).await?;
            tx.commit().await?;
            Ok::<_, AppError>(files)
        }
        .await;

        let removed = remove_after_commit(&self.upload_dir, committed).await?;
        tracing::info!(company_id = %company.id, removed, "Company deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_cannot_mint_superadmins() {
        let admin = User::fixture(UserRole::Admin, Some(Uuid::new_v4()));
        assert!(matches!(ensure_can_assign(&admin, UserRole::SuperAdmin), Err(AppError::Forbidden(_))));
        assert!(ensure_can_assign(&admin, UserRole::Admin).is_ok());
        assert!(ensure_can_assign(&admin, UserRole::User).is_ok());

        let root = User::fixture(UserRole::SuperAdmin, None);
        assert!(ensure_can_assign(&root, UserRole::SuperAdmin).is_ok());
    }
}
