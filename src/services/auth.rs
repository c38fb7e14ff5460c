// src/services/auth.rs

use std::{path::PathBuf, sync::Arc};

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        files::{extension_of, remove_stored_files, store_file},
    },
    db::{BillingRepository, CompanyRepository, PermissionRepository, UserRepository},
    models::{
        auth::{
            AuthResponse, ChangePasswordPayload, Claims, LoginPayload, RegisterPayload,
            ResetPasswordPayload, UpdateProfilePayload, User, UserRole,
        },
        billing::SubscriptionStatus,
        permission::ModuleGrant,
        support::IncomingFile,
    },
    services::mail::{spawn_send, Mailer, OutgoingMail},
};

const RESET_TOKEN_LEN: usize = 48;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// HS256 keys plus the token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            company_id: user.company_id,
            role: user.role,
            exp: (now + self.ttl).timestamp().max(0) as usize,
            iat: now.timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Signature and expiry check. Any failure is reported as `InvalidToken`.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected JWT: {}", e);
                AppError::InvalidToken
            })
    }
}

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))??;
    Ok(hashed)
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    let valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
        .await
        .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))??;
    Ok(valid)
}

pub(crate) fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    company_repo: CompanyRepository,
    permission_repo: PermissionRepository,
    billing_repo: BillingRepository,
    keys: JwtKeys,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    upload_dir: PathBuf,
    pool: PgPool,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: UserRepository,
        company_repo: CompanyRepository,
        permission_repo: PermissionRepository,
        billing_repo: BillingRepository,
        keys: JwtKeys,
        mailer: Arc<dyn Mailer>,
        frontend_url: String,
        upload_dir: PathBuf,
        pool: PgPool,
    ) -> Self {
        Self {
            user_repo,
            company_repo,
            permission_repo,
            billing_repo,
            keys,
            mailer,
            frontend_url,
            upload_dir,
            pool,
        }
    }

    /// Self-service sign-up: a new company, its first admin, the admin's
    /// default grants and a free subscription, all in one transaction.
    pub async fn register(&self, payload: &RegisterPayload) -> Result<AuthResponse, AppError> {
        let password_hash = hash_password(&payload.password).await?;
        let email = payload.email.trim().to_lowercase();

        let mut tx = self.pool.begin().await?;

        let company = self
            .company_repo
            .create_company(&mut *tx, payload.company_name.trim(), Some(&email), None, None)
            .await?;

        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                Some(company.id),
                payload.name.trim(),
                &email,
                &password_hash,
                UserRole::Admin,
                None,
            )
            .await?;

        self.permission_repo
            .upsert_grants(&mut *tx, user.id, &ModuleGrant::defaults_for(user.role))
            .await?;

        let free_plan = self.billing_repo.free_plan(&mut tx).await?;
        self.billing_repo
            .create_subscription(
                &mut tx,
                company.id,
                user.id,
                free_plan.id,
                SubscriptionStatus::Active,
                Some(Utc::now()),
                None,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, company_id = %company.id, "New company registered");

        let token = self.keys.issue(&user)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(payload.email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&payload.password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Resolves a bearer token to a live, active user.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.keys.decode(token)?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !user.is_active {
            return Err(AppError::InvalidToken);
        }
        Ok(user)
    }

    pub async fn update_profile(&self, user_id: Uuid, payload: &UpdateProfilePayload) -> Result<User, AppError> {
        self.user_repo
            .update_profile(
                user_id,
                payload.name.as_deref().map(str::trim),
                payload.phone.as_deref().map(str::trim),
            )
            .await
    }

    pub async fn change_password(&self, user: &User, payload: &ChangePasswordPayload) -> Result<(), AppError> {
        if !verify_password(&payload.current_password, &user.password_hash).await? {
            return Err(AppError::bad_request("The current password is incorrect."));
        }
        let password_hash = hash_password(&payload.new_password).await?;
        self.user_repo.update_password(user.id, &password_hash).await
    }

    /// Stores a new profile picture and removes the previous one.
    pub async fn update_avatar(&self, user: &User, file: IncomingFile) -> Result<User, AppError> {
        let ext = extension_of(&file.file_name).unwrap_or_default();
        if !AVATAR_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::bad_request("The profile image must be a PNG, JPEG or WebP file."));
        }
        if file.bytes.is_empty() {
            return Err(AppError::bad_request("The uploaded image is empty."));
        }

        let path = store_file(&self.upload_dir, "profiles", &file.file_name, &file.bytes).await?;
        let previous = self.user_repo.set_profile_image(user.id, &path).await?;

        if let Some(previous) = previous.filter(|p| p != &path) {
            remove_stored_files(&self.upload_dir, &[previous]).await;
        }

        self.user_repo
            .find_by_id(user.id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Always succeeds so the endpoint cannot be used to probe for accounts.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.user_repo.find_by_email(email.trim()).await? else {
            tracing::info!("Password reset requested for an unknown e-mail");
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }

        let token = random_token(RESET_TOKEN_LEN);
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.user_repo.set_reset_token(user.id, &token, expires_at).await?;

        spawn_send(
            self.mailer.clone(),
            OutgoingMail {
                to: user.email.clone(),
                subject: "Reset your password".to_string(),
                body: format!(
                    "Hello {},\n\nUse the link below to choose a new password. It expires in one hour.\n\n{}/reset-password?token={}\n\nIf you did not ask for this, ignore this e-mail.",
                    user.name, self.frontend_url, token
                ),
            },
        );
        Ok(())
    }

    pub async fn reset_password(&self, payload: &ResetPasswordPayload) -> Result<(), AppError> {
        let user = self
            .user_repo
            .find_by_valid_reset_token(payload.token.trim())
            .await?
            .ok_or_else(|| AppError::bad_request("The reset link is invalid or has expired."))?;

        let password_hash = hash_password(&payload.password).await?;
        self.user_repo.update_password(user.id, &password_hash).await?;
        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let keys = JwtKeys::new("secret", 1);
        let user = User::fixture(UserRole::Admin, Some(Uuid::new_v4()));

        let claims = keys.decode(&keys.issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.company_id, user.company_id);
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = JwtKeys::new("secret", -2);
        let token = keys.issue(&User::fixture(UserRole::User, None)).unwrap();
        assert!(matches!(keys.decode(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = JwtKeys::new("one", 1).issue(&User::fixture(UserRole::User, None)).unwrap();
        assert!(matches!(JwtKeys::new("two", 1).decode(&token), Err(AppError::InvalidToken)));
        assert!(matches!(JwtKeys::new("one", 1).decode("garbage"), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn password_hashes_verify() {
        let hashed = hash_password("correct horse").await.unwrap();
        assert!(verify_password("correct horse", &hashed).await.unwrap());
        assert!(!verify_password("battery staple", &hashed).await.unwrap());
    }

    #[test]
    fn reset_tokens_are_random_and_alphanumeric() {
        let a = random_token(RESET_TOKEN_LEN);
        let b = random_token(RESET_TOKEN_LEN);
        assert_eq!(a.len(), RESET_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
