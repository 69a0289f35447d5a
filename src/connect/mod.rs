//! Token collaborators for schema services that need a signed-in user.
//!
//! The schema engine never talks to an identity service itself. Callers plug
//! in a [`TokenClient`] that performs the request and a [`TokenStore`] that
//! persists the result; [`TokenProvider`] sits between them and makes sure
//! concurrent refreshes share one request.

mod provider;
mod token;

use thiserror::Error;

pub use provider::{DEFAULT_LIFETIME_MINUTES, TokenProvider};
pub use token::{Credentials, MemoryTokenStore, Token, TokenClient, TokenStore};

/// Errors returned by a token request.
///
/// Cloneable so one failed request can be reported to every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The identity service answered with an error status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request could not be made or its answer could not be read.
    #[error("Token request failed: {0}")]
    Request(String),

    /// No credentials are available to request a token with.
    #[error("No credentials available")]
    NoCredentials,
}
