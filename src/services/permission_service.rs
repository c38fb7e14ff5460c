// src/services/permission_service.rs

use std::collections::BTreeMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{PermissionRepository, UserRepository},
    models::{
        auth::{User, UserRole},
        permission::{ModuleGrant, PermissionModule, UserPermission},
    },
};

/// One entry per module in `PermissionModule::ALL` order; modules without a
/// stored row are reported with every flag off.
pub fn complete_grants(rows: &[UserPermission]) -> Vec<ModuleGrant> {
    PermissionModule::ALL
        .iter()
        .map(|&module| {
            rows.iter()
                .find(|p| p.module == module)
                .map(ModuleGrant::from)
                .unwrap_or(ModuleGrant {
                    module,
                    can_view: false,
                    can_create: false,
                    can_update: false,
                    can_delete: false,
                })
        })
        .collect()
}

/// Collapses duplicate modules; the last occurrence wins.
fn dedupe(grants: &[ModuleGrant]) -> Vec<ModuleGrant> {
    let by_module: BTreeMap<_, _> = grants
        .iter()
        .map(|g| (PermissionModule::ALL.iter().position(|m| *m == g.module), *g))
        .collect();
    by_module.into_values().collect()
}

#[derive(Clone)]
pub struct PermissionService {
    repo: PermissionRepository,
    user_repo: UserRepository,
    pool: PgPool,
}

impl PermissionService {
    pub fn new(repo: PermissionRepository, user_repo: UserRepository, pool: PgPool) -> Self {
        Self { repo, user_repo, pool }
    }

    pub async fn grant_for(&self, user_id: Uuid, module: PermissionModule) -> Result<Option<ModuleGrant>, AppError> {
        let row = self.repo.find_for_module(user_id, module).await?;
        Ok(row.as_ref().map(ModuleGrant::from))
    }

    pub async fn list_own(&self, user_id: Uuid) -> Result<Vec<ModuleGrant>, AppError> {
        let rows = self.repo.list_for_user(user_id).await?;
        Ok(complete_grants(&rows))
    }

    /// Admins may only look at users of their own company.
    async fn target_user(&self, actor: &User, target_id: Uuid) -> Result<User, AppError> {
        let target = self
            .user_repo
            .find_by_id(target_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if actor.role != UserRole::SuperAdmin && target.company_id != actor.company_id {
            return Err(AppError::UserNotFound);
        }
        Ok(target)
    }

    pub async fn list_for_user(&self, actor: &User, target_id: Uuid) -> Result<Vec<ModuleGrant>, AppError> {
        let target = self.target_user(actor, target_id).await?;
        self.list_own(target.id).await
    }

    /// Replaces the user's whole grant set atomically.
    pub async fn replace(
        &self,
        actor: &User,
        target_id: Uuid,
        grants: &[ModuleGrant],
    ) -> Result<Vec<ModuleGrant>, AppError> {
        let target = self.target_user(actor, target_id).await?;
        let grants = dedupe(grants);

        let mut tx = self.pool.begin().await?;
        self.repo.delete_for_user(&mut *tx, target.id).await?;
        self.repo.upsert_grants(&mut *tx, target.id, &grants).await?;
        tx.commit().await?;

        tracing::info!(
            actor_id = %actor.id,
            user_id = %target.id,
            modules = grants.len(),
            "Permissions replaced"
        );
        self.list_own(target.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(module: PermissionModule, can_view: bool) -> ModuleGrant {
        ModuleGrant { module, can_view, can_create: false, can_update: false, can_delete: false }
    }

    #[test]
    fn missing_modules_are_filled_with_denials() {
        let stored = UserPermission {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            module: PermissionModule::Billing,
            can_view: true,
            can_create: false,
            can_update: true,
            can_delete: false,
        };
        let grants = complete_grants(&[stored]);

        assert_eq!(grants.len(), PermissionModule::ALL.len());
        let billing = grants.iter().find(|g| g.module == PermissionModule::Billing).unwrap();
        assert!(billing.can_view && billing.can_update);
        let hotels = grants.iter().find(|g| g.module == PermissionModule::Hotels).unwrap();
        assert!(!hotels.can_view);
    }

    #[test]
    fn duplicate_modules_keep_the_last_entry() {
        let grants = dedupe(&[
            grant(PermissionModule::Support, true),
            grant(PermissionModule::Hotels, true),
            grant(PermissionModule::Support, false),
        ]);
        assert_eq!(grants, vec![grant(PermissionModule::Hotels, true), grant(PermissionModule::Support, false)]);
    }
}
