//! Session credential storage.
//!
//! This module provides:
//! - `TokenStore`: the seam the API client reads tokens from and writes refreshed tokens to
//! - `MemoryTokenStore`: process-local storage for ephemeral sessions and tests
//! - `FileTokenStore`: JSON session file in the cache directory
//! - `KeyringTokenStore`: secure OS-level storage via keyring

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{FileTokenStore, SessionData};
pub use store::{Credentials, MemoryTokenStore, TokenStore};
