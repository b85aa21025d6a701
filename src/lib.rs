//! Zoom attendance and registrant sync for CiviCRM events
//!
//! Links CRM events to Zoom webinars or meetings, marks registered
//! participants as attended from Zoom attendance data, copies Zoom
//! participant details into custom fields, and records or mails recent
//! webinar registrants.
//!
//! # Modules
//!
//! - `client`: Zoom REST client behind the `ZoomApi` trait
//! - `crm`: CiviCRM APIv3 client behind the `CrmApi` trait
//! - `auth`: JWT generation for Zoom API calls
//! - `services`: settings, attendance reconciliation, participant sync,
//!   registrant notes and email notifications
//! - `handlers` / `routes`: the axum HTTP surface
//!
//! # Authentication
//!
//! Zoom requests carry an HS256 JWT built from the account's API key and
//! secret. CRM requests send the contact API key and the site key as
//! headers.

pub mod auth;
pub mod client;
pub mod config;
pub mod crm;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod client_mock;

// Re-export the main API types for ease of use
pub use auth::ZoomAuth;
pub use client::{ZoomApi, ZoomClient};
pub use crm::{CrmApi, CrmClient};
pub use error::{CrmError, SyncError, ZoomError};
pub use handlers::api::AppState;
pub use routes::create_router;
