//! vidsub API Library
//!
//! HTTP handlers, authentication, domain services and application setup for
//! the video submission service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;

pub mod auth;
pub mod error;
pub mod state;

pub use error::ErrorResponse;
pub use state::AppState;
