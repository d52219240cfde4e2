//! Router control API integration
//!
//! - `client`: JSON-over-HTTP client (login, online host table)

pub mod client;

pub use client::RouterClient;

use async_trait::async_trait;

use crate::error::RouterError;
use crate::models::Snapshot;

/// `error_code` the router returns when the session token is expired or invalid
pub const SESSION_EXPIRED_CODE: i64 = -40401;

/// Router API seam used by the monitor loop
#[async_trait]
pub trait RouterApi: Send + Sync {
    /// Log in with the admin password and return a session token
    async fn login(&self, password: &str) -> Result<String, RouterError>;

    /// Fetch the devices currently associated with the router
    async fn online_hosts(&self, token: &str) -> Result<Snapshot, RouterError>;
}
