pub mod auth;
pub mod billing;
pub mod company;
pub mod forecast;
pub mod hotel;
pub mod notification;
pub mod permission;
pub mod scrape;
pub mod support;
pub mod upload;
