// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{common::error::AppError, middleware::auth::AuthenticatedUser, models::auth::UserRole};

// Lets a superadmin act inside any company
const COMPANY_ID_HEADER: &str = "x-company-id";

/// The company (tenant) a request operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyContext(pub Uuid);

pub(crate) fn resolve_company(user: &AuthenticatedUser, header: Option<&str>) -> Result<Uuid, AppError> {
    if user.0.role == UserRole::SuperAdmin {
        if let Some(raw) = header {
            return Uuid::parse_str(raw.trim())
                .map_err(|_| AppError::bad_request("Header x-company-id is not a valid UUID."));
        }
    }

    user.0
        .company_id
        .ok_or_else(|| AppError::bad_request("No company selected. Send the x-company-id header."))
}

impl<S> FromRequestParts<S> for CompanyContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        let header = parts
            .headers
            .get(COMPANY_ID_HEADER)
            .map(|value| {
                value
                    .to_str()
                    .map_err(|_| AppError::bad_request("Header x-company-id contains invalid characters."))
            })
            .transpose()?;

        resolve_company(user, header).map(CompanyContext)
    }
}
