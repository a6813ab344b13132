//! pagepulse core: API client and session handling for the pagepulse
//! web-analytics backend.
//!
//! The `api` module talks to the backend and transparently refreshes expired
//! access tokens. `auth` holds the pluggable token stores, `config` the user
//! settings, and `models` the data exchanged with the backend.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use config::Config;
