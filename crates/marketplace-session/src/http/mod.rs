/*
[INPUT]:  HTTP client configuration and auth endpoints
[OUTPUT]: HTTP responses, typed auth results, crate error types
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod auth;
pub mod client;
pub mod error;

pub use auth::AuthBackend;
pub use client::{ApiClient, ClientConfig};
pub use error::{ErrorKind, LinkError, RefreshError, Result, SessionError};
