// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::UserRole,
        permission::{ModuleGrant, PermissionAction, PermissionModule},
    },
};

// ---
// Role allow-lists
// ---

pub trait RoleSet: Send + Sync + 'static {
    fn allowed() -> &'static [UserRole];

    fn allows(role: UserRole) -> bool {
        Self::allowed().contains(&role)
    }
}

pub struct AnyRole;
impl RoleSet for AnyRole {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::SuperAdmin, UserRole::Admin, UserRole::User]
    }
}

pub struct AdminOnly;
impl RoleSet for AdminOnly {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::SuperAdmin, UserRole::Admin]
    }
}

pub struct SuperAdminOnly;
impl RoleSet for SuperAdminOnly {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::SuperAdmin]
    }
}

/// Rejects with 403 unless the caller's role is in `R`.
pub struct RequireRole<R>(pub PhantomData<R>);

impl<R, S> FromRequestParts<S> for RequireRole<R>
where
    R: RoleSet,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        if !R::allows(user.0.role) {
            return Err(AppError::forbidden("Your role is not allowed to perform this action."));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// Per-user module permissions
// ---

pub trait PermissionDef: Send + Sync + 'static {
    const MODULE: PermissionModule;
    const ACTION: PermissionAction;
}

/// Checks the caller's `user_permissions` flag for `P`. Admins bypass the table.
pub struct RequirePermission<P>(pub PhantomData<P>);

impl<P, S> FromRequestParts<S> for RequirePermission<P>
where
    P: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        if user.0.role.is_admin() {
            return Ok(RequirePermission(PhantomData));
        }

        let app_state = AppState::from_ref(state);
        let grant = app_state
            .permission_service
            .grant_for(user.0.id, P::MODULE)
            .await?;

        if !grant.is_some_and(|g: ModuleGrant| g.allows(P::ACTION)) {
            return Err(AppError::forbidden(format!(
                "You need the '{:?}:{:?}' permission to perform this action.",
                P::MODULE,
                P::ACTION
            )
            .to_lowercase()));
        }

        Ok(RequirePermission(PhantomData))
    }
}

macro_rules! permission {
    ($name:ident, $module:ident, $action:ident) => {
        pub struct $name;
        impl PermissionDef for $name {
            const MODULE: PermissionModule = PermissionModule::$module;
            const ACTION: PermissionAction = PermissionAction::$action;
        }
    };
}

permission!(PermHotelsView, Hotels, View);
permission!(PermHotelsCreate, Hotels, Create);
permission!(PermHotelsUpdate, Hotels, Update);
permission!(PermHotelsDelete, Hotels, Delete);
permission!(PermUploadsView, Uploads, View);
permission!(PermUploadsCreate, Uploads, Create);
permission!(PermUploadsUpdate, Uploads, Update);
permission!(PermUploadsDelete, Uploads, Delete);
permission!(PermReportsView, Reports, View);
permission!(PermForecastView, Forecast, View);
permission!(PermSupportView, Support, View);
permission!(PermSupportCreate, Support, Create);
permission!(PermSupportUpdate, Support, Update);
permission!(PermSupportDelete, Support, Delete);
permission!(PermScrapingView, Scraping, View);
permission!(PermScrapingUpdate, Scraping, Update);
permission!(PermBillingView, Billing, View);
permission!(PermBillingUpdate, Billing, Update);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        middleware::tenancy::{resolve_company, CompanyContext},
        models::auth::User,
    };
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_for(user: Option<User>) -> Parts {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        if let Some(user) = user {
            parts.extensions.insert(AuthenticatedUser(user));
        }
        parts
    }

    #[tokio::test]
    async fn admin_only_denies_plain_users() {
        let mut parts = parts_for(Some(User::fixture(UserRole::User, Some(Uuid::new_v4()))));
        let result = RequireRole::<AdminOnly>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn admin_only_accepts_admins_and_superadmins() {
        for role in [UserRole::Admin, UserRole::SuperAdmin] {
            let mut parts = parts_for(Some(User::fixture(role, None)));
            assert!(RequireRole::<AdminOnly>::from_request_parts(&mut parts, &()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn superadmin_only_denies_company_admins() {
        let mut parts = parts_for(Some(User::fixture(UserRole::Admin, Some(Uuid::new_v4()))));
        let result = RequireRole::<SuperAdminOnly>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        let mut parts = parts_for(None);
        let result = RequireRole::<AnyRole>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn company_context_uses_the_users_company() {
        let company = Uuid::new_v4();
        let mut parts = parts_for(Some(User::fixture(UserRole::User, Some(company))));
        parts.headers.insert("x-company-id", Uuid::new_v4().to_string().parse().unwrap());

        // Only superadmins may switch company; the header is ignored otherwise.
        let ctx = CompanyContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx, CompanyContext(company));
    }

    #[test]
    fn superadmin_switches_company_with_header() {
        let target = Uuid::new_v4();
        let user = AuthenticatedUser(User::fixture(UserRole::SuperAdmin, None));
        assert_eq!(resolve_company(&user, Some(&target.to_string())).unwrap(), target);
        assert!(resolve_company(&user, Some("not-a-uuid")).is_err());
        assert!(resolve_company(&user, None).is_err());
    }
}
