// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        BillingRepository, CompanyRepository, HotelRepository, NotificationRepository,
        PermissionRepository, ScrapeRepository, SupportRepository, UploadRepository,
        UserRepository,
    },
    services::{
        auth::{AuthService, JwtKeys},
        billing_service::{BillingService, PaymentGateway, StripeGateway},
        forecast_service::{ForecastService, OpenAiClient},
        hotel_service::HotelService,
        mail::{LogMailer, Mailer, SmtpMailer},
        notification_service::NotificationService,
        permission_service::PermissionService,
        scrape_service::{BookingRapidApiSource, ExpediaScrapingBeeSource, RateSource, ScrapeService},
        support_service::SupportService,
        upload_service::UploadService,
        user_service::UserService,
    },
};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub frontend_url: String,
    pub http_timeout: Duration,
    pub smtp: Option<SmtpConfig>,
    pub stripe_secret_key: Option<String>,
    pub stripe_currency: String,
    pub scrape_secret: Option<String>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: String,
    pub scrapingbee_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));
        let parsed = |key: &str, default: &str| -> anyhow::Result<String> {
            Ok(get(key).unwrap_or_else(|| default.to_string()))
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parsed("SMTP_PORT", "587")?
                    .parse()
                    .context("SMTP_PORT must be a port number")?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from: required("SMTP_FROM")?,
            }),
            None => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "5")?
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            bind_addr: parsed("BIND_ADDR", "0.0.0.0:3000")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", "24")?
                .parse()
                .context("JWT_TTL_HOURS must be an integer")?,
            upload_dir: PathBuf::from(parsed("UPLOAD_DIR", "uploads")?),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", "20971520")?
                .parse()
                .context("MAX_UPLOAD_BYTES must be an integer")?,
            frontend_url: parsed("FRONTEND_URL", "http://localhost:5173")?
                .trim_end_matches('/')
                .to_string(),
            http_timeout: Duration::from_secs(
                parsed("HTTP_TIMEOUT_SECS", "30")?
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be an integer")?,
            ),
            smtp,
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_currency: parsed("STRIPE_CURRENCY", "usd")?.to_lowercase(),
            scrape_secret: get("SCRAPE_SECRET"),
            rapidapi_key: get("RAPIDAPI_KEY"),
            rapidapi_host: parsed("RAPIDAPI_HOST", "booking-com.p.rapidapi.com")?,
            scrapingbee_api_key: get("SCRAPINGBEE_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: parsed("OPENAI_MODEL", "gpt-4o-mini")?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub user_repo: UserRepository,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub permission_service: PermissionService,
    pub hotel_service: HotelService,
    pub upload_service: UploadService,
    pub scrape_service: ScrapeService,
    pub billing_service: BillingService,
    pub support_service: SupportService,
    pub notification_service: NotificationService,
    pub forecast_service: ForecastService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("failed to connect to the database")?;

        tracing::info!("Database connection established");

        Self::with_pool(config, db_pool)
    }

    /// Wires repositories and services on top of an existing pool.
    pub fn with_pool(config: Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP is not configured; outgoing e-mail will only be logged");
                Arc::new(LogMailer)
            }
        };

        let user_repo = UserRepository::new(db_pool.clone());
        let company_repo = CompanyRepository::new(db_pool.clone());
        let permission_repo = PermissionRepository::new(db_pool.clone());
        let hotel_repo = HotelRepository::new(db_pool.clone());
        let upload_repo = UploadRepository::new(db_pool.clone());
        let scrape_repo = ScrapeRepository::new(db_pool.clone());
        let billing_repo = BillingRepository::new(db_pool.clone());
        let support_repo = SupportRepository::new(db_pool.clone());
        let notification_repo = NotificationRepository::new(db_pool.clone());

        let notification_service = NotificationService::new(notification_repo);

        let auth_service = AuthService::new(
            user_repo.clone(),
            company_repo.clone(),
            permission_repo.clone(),
            billing_repo.clone(),
            JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            mailer.clone(),
            config.frontend_url.clone(),
            config.upload_dir.clone(),
            db_pool.clone(),
        );

        let user_service = UserService::new(
            user_repo.clone(),
            company_repo,
            permission_repo.clone(),
            mailer.clone(),
            config.frontend_url.clone(),
            config.upload_dir.clone(),
            db_pool.clone(),
        );

        let permission_service = PermissionService::new(permission_repo, user_repo.clone(), db_pool.clone());
        let hotel_service = HotelService::new(hotel_repo.clone(), db_pool.clone());
        let upload_service = UploadService::new(
            upload_repo.clone(),
            hotel_repo.clone(),
            notification_service.clone(),
            db_pool.clone(),
        );

        let mut sources: Vec<Arc<dyn RateSource>> = Vec::new();
        if let Some(key) = &config.rapidapi_key {
            sources.push(Arc::new(BookingRapidApiSource::new(
                http.clone(),
                key.clone(),
                config.rapidapi_host.clone(),
            )));
        }
        if let Some(key) = &config.scrapingbee_api_key {
            sources.push(Arc::new(ExpediaScrapingBeeSource::new(http.clone(), key.clone())));
        }
        let scrape_service = ScrapeService::new(scrape_repo.clone(), hotel_repo.clone(), sources);

        let gateway: Option<Arc<dyn PaymentGateway>> = config
            .stripe_secret_key
            .as_deref()
            .map(|key| Arc::new(StripeGateway::new(key, &config.stripe_currency)) as Arc<dyn PaymentGateway>);
        if gateway.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY is not set; paid checkouts are disabled");
        }
        let billing_service = BillingService::new(
            billing_repo,
            gateway,
            notification_service.clone(),
            config.frontend_url.clone(),
            db_pool.clone(),
        );

        let support_service = SupportService::new(
            support_repo,
            user_repo.clone(),
            notification_service.clone(),
            mailer,
            config.upload_dir.clone(),
            db_pool.clone(),
        );

        let openai = config
            .openai_api_key
            .as_ref()
            .map(|key| OpenAiClient::new(http.clone(), key.clone(), config.openai_model.clone()));
        let forecast_service = ForecastService::new(upload_repo, hotel_repo, scrape_repo, openai);

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            user_repo,
            auth_service,
            user_service,
            permission_service,
            hotel_service,
            upload_service,
            scrape_service,
            billing_service,
            support_service,
            notification_service,
            forecast_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults_when_only_required_values_are_set() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/revenue"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(config.smtp.is_none());
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn missing_required_value_is_an_error() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn smtp_requires_its_credentials_once_host_is_set() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("SMTP_HOST", "smtp.example.com"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_USERNAME"));
    }

    #[test]
    fn blank_values_are_treated_as_unset_and_urls_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("STRIPE_SECRET_KEY", "   "),
            ("FRONTEND_URL", "https://app.example.com/"),
        ]))
        .unwrap();
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.frontend_url, "https://app.example.com");
    }
}
