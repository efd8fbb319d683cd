//! Error types for twoeat-recs
//!
//! Errors are `Clone` because a single in-flight session start fans its
//! result out to every caller that joined it.

use thiserror::Error;

/// Controller and transport error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecsError {
    /// No bearer token available, or the service rejected it
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Service does not recognize the session (HTTP 400/409)
    #[error("Session is stale or invalid (HTTP {status})")]
    StaleSession { status: u16 },

    /// Service has nothing left to recommend for this session
    #[error("No more suggestions")]
    NoMoreSuggestions,

    /// Any other non-2xx response
    #[error("Service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, timeout or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// 2xx response carrying `ok: false`
    #[error("Service rejected request: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Operation needs a location but none was supplied yet
    #[error("No location available")]
    NoLocation,

    /// Operation needs a session but none exists
    #[error("No active session")]
    NoSession,

    /// Session already completed or finalized
    #[error("Session {0} is closed")]
    SessionClosed(String),

    /// Finalize succeeded but no detail record exists for the winner
    #[error("Winner details unavailable for candidate {0}")]
    WinnerUnavailable(String),

    /// Controller was torn down
    #[error("Controller has been shut down")]
    ShutDown,

    /// Invalid argument from the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RecsError {
    /// Errors that the recovery policy is allowed to handle once
    pub fn is_stale_session(&self) -> bool {
        matches!(self, RecsError::StaleSession { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, RecsError::Auth(_))
    }
}

impl From<twoeat_common::Error> for RecsError {
    fn from(err: twoeat_common::Error) -> Self {
        RecsError::InvalidInput(err.to_string())
    }
}

/// Convenience Result type using RecsError
pub type Result<T> = std::result::Result<T, RecsError>;
