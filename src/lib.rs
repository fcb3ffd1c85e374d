//! Recruiting Service
//!
//! This library provides the HTTP service behind the recruiting dashboard:
//! job postings and the paginated listings of jobs, resumes, candidate
//! matches, interview kits and notes.
//!
//! # Modules
//!
//! - `services::pagination`: the list pipeline shared by every listing endpoint
//! - `services::database`: CSV-backed document store
//! - `handlers`: axum request handlers
//! - `config`: environment-driven configuration
//!
//! # List envelope
//!
//! Listing endpoints answer with `{ success, data, pagination }`, where
//! `pagination` carries `page`, `limit`, `total`, `totalPages`,
//! `hasNextPage`, `hasPrevPage`, `nextPage` and `prevPage`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod integration_tests;

// Re-export the main API types for ease of use
pub use config::AppConfig;
pub use error::{ApiError, StoreError};
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::database::{create_database_service, CsvDocumentStore, DocumentStore};
