//! Client-side session for the icebrg search API.
//!
//! [`SessionStore`] owns the access/refresh token pair and persists it through
//! an [`icebrg_kv_store::KeyValueStore`]. [`RefreshLoop`] keeps it fresh in the
//! background, and [`token_data`] decodes bearer tokens to decide when.

pub mod client;
pub mod config;
mod error;
pub mod refresh;
pub mod store;
mod test_helpers;
pub mod token_data;

pub use client::AuthClient;
pub use client::TokenResponse;
pub use config::ClientConfig;
pub use error::ErrorKind;
pub use error::Result;
pub use error::SessionError;
pub use refresh::RefreshLoop;
pub use refresh::TickOutcome;
pub use refresh::check_session;
pub use store::Session;
pub use store::SessionStore;
pub use token_data::TokenPayload;
