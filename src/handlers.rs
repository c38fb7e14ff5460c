// src/handlers.rs

pub mod auth;
pub mod billing;
pub mod forecast;
pub mod form;
pub mod hotels;
pub mod notifications;
pub mod permissions;
pub mod scrape;
pub mod support;
pub mod uploads;
pub mod users;
