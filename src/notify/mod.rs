//! Presence notifications
//!
//! - `format`: renders title and body from a set of transitions
//! - `bark`: push delivery over HTTP

mod bark;
pub mod format;

pub use self::bark::BarkNotifier;
pub use self::format::{render, Notification};

use async_trait::async_trait;

/// Push delivery trait
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    async fn send(&self, notification: &Notification) -> Result<(), String>;

    /// Get the notifier name
    fn name(&self) -> &'static str;
}
