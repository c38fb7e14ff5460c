pub mod auth;
pub mod billing_service;
pub mod forecast_service;
pub mod hotel_service;
pub mod ingest;
pub mod mail;
pub mod notification_service;
pub mod permission_service;
pub mod scrape_service;
pub mod support_service;
pub mod upload_service;
pub mod user_service;
