// src/models/permission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::auth::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "permission_module", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PermissionModule {
    Hotels,
    Uploads,
    Reports,
    Forecast,
    Support,
    Scraping,
    Billing,
    Users,
}

impl PermissionModule {
    pub const ALL: [PermissionModule; 8] = [
        PermissionModule::Hotels,
        PermissionModule::Uploads,
        PermissionModule::Reports,
        PermissionModule::Forecast,
        PermissionModule::Support,
        PermissionModule::Scraping,
        PermissionModule::Billing,
        PermissionModule::Users,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    View,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module: PermissionModule,
    pub can_view: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

/// The flags for one module, as sent by the permission editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGrant {
    pub module: PermissionModule,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_update: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl ModuleGrant {
    pub fn allows(&self, action: PermissionAction) -> bool {
        match action {
            PermissionAction::View => self.can_view,
            PermissionAction::Create => self.can_create,
            PermissionAction::Update => self.can_update,
            PermissionAction::Delete => self.can_delete,
        }
    }

    /// Grants a freshly created user starts with.
    pub fn defaults_for(role: UserRole) -> Vec<ModuleGrant> {
        PermissionModule::ALL
            .iter()
            .map(|&module| {
                if role.is_admin() {
                    ModuleGrant { module, can_view: true, can_create: true, can_update: true, can_delete: true }
                } else {
                    let can_create = matches!(module, PermissionModule::Uploads | PermissionModule::Support);
                    ModuleGrant { module, can_view: true, can_create, can_update: false, can_delete: false }
                }
            })
            .collect()
    }
}

impl From<&UserPermission> for ModuleGrant {
    fn from(p: &UserPermission) -> Self {
        ModuleGrant {
            module: p.module,
            can_view: p.can_view,
            can_create: p.can_create,
            can_update: p.can_update,
            can_delete: p.can_delete,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplacePermissionsPayload {
    pub permissions: Vec<ModuleGrant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_get_every_action_on_every_module() {
        let grants = ModuleGrant::defaults_for(UserRole::Admin);
        assert_eq!(grants.len(), PermissionModule::ALL.len());
        assert!(grants.iter().all(|g| g.can_view && g.can_create && g.can_update && g.can_delete));
    }

    #[test]
    fn plain_users_can_view_everything_but_only_create_uploads_and_tickets() {
        let grants = ModuleGrant::defaults_for(UserRole::User);
        for g in &grants {
            assert!(g.allows(PermissionAction::View));
            assert!(!g.allows(PermissionAction::Delete));
            let expect_create = matches!(g.module, PermissionModule::Uploads | PermissionModule::Support);
            assert_eq!(g.allows(PermissionAction::Create), expect_create, "{:?}", g.module);
        }
    }
}
