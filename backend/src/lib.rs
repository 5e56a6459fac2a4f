pub mod auth;
pub mod axum_http;
pub mod config;
pub mod realtime;
pub mod usecases;
