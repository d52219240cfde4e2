//! Error handling module

use thiserror::Error;

/// Failures reported by the router control API
#[derive(Error, Debug)]
pub enum RouterError {
    /// Router rejected the credentials or the session token
    #[error("Router authentication failed (error_code {code})")]
    Auth { code: i64 },

    /// Transport failure, malformed response or non-auth error code
    #[error("Router request failed: {0}")]
    Fetch(String),
}

impl From<reqwest::Error> for RouterError {
    fn from(e: reqwest::Error) -> Self {
        RouterError::Fetch(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Giving up after {attempts} consecutive authentication failures (last error_code {code})")]
    AuthExhausted { attempts: u32, code: i64 },
}
