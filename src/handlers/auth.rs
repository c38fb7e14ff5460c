// src/handlers/auth.rs

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::form::FormData,
    middleware::auth::AuthenticatedUser,
    models::auth::{
        AuthResponse, ChangePasswordPayload, ForgotPasswordPayload, LoginPayload, RegisterPayload,
        ResetPasswordPayload, UpdateProfilePayload, User,
    },
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Company and first admin created", body = AuthResponse),
        (status = 409, description = "E-mail already in use")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.validate()?;
    let response = app_state.auth_service.register(&payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;
    let response = app_state.auth_service.login(&payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordPayload,
    responses((status = 200, description = "Reset e-mail sent when the account exists"))
)]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;
    app_state.auth_service.forgot_password(&payload.email).await?;
    Ok(Json(json!({ "message": "If the e-mail is registered, a reset link is on its way." })))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordPayload,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;
    app_state.auth_service.reset_password(&payload).await?;
    Ok(Json(json!({ "message": "Password updated." })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Profile",
    responses((status = 200, description = "The signed-in user", body = User)),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

#[utoipa::path(
    put,
    path = "/api/auth/me",
    tag = "Profile",
    request_body = UpdateProfilePayload,
    responses((status = 200, description = "Profile updated", body = User)),
    security(("api_jwt" = []))
)]
pub async fn update_me(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<User>, AppError> {
    payload.validate()?;
    let user = app_state.auth_service.update_profile(user.id, &payload).await?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/api/auth/me/password",
    tag = "Profile",
    request_body = ChangePasswordPayload,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_password(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    app_state.auth_service.change_password(&user, &payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Multipart with a single `image` part
#[utoipa::path(
    post,
    path = "/api/auth/me/avatar",
    tag = "Profile",
    request_body(content_type = "multipart/form-data", description = "`image`: png, jpg, jpeg or webp"),
    responses((status = 200, description = "Avatar stored", body = User)),
    security(("api_jwt" = []))
)]
pub async fn upload_avatar(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let mut form = FormData::read(multipart).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::bad_request("The 'image' file is required."))?;

    let user = app_state.auth_service.update_avatar(&user, image).await?;
    Ok(Json(user))
}
