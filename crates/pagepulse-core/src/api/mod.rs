//! REST API client module for the pagepulse backend.
//!
//! This module provides the `ApiClient` for logging in, managing sites and
//! fetching per-site analytics.
//!
//! The backend issues short-lived JWT access tokens plus a refresh token.
//! Expired access tokens are renewed transparently by the client.

pub mod account;
pub mod analytics;
pub mod client;
pub mod error;
mod refresh;

pub use client::ApiClient;
pub use error::ApiError;
