//! Bark push notifications
//!
//! Title and body travel as URL path segments:
//! `POST <base>/<key>/<title>/<body>?group=<group>`

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{Notification, Notifier};
use crate::error::AppError;

pub struct BarkNotifier {
    client: reqwest::Client,
    base_url: Url,
    key: String,
    group: String,
    timeout: Duration,
}

impl BarkNotifier {
    pub fn new(
        base_url: Url,
        key: String,
        group: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self {
            client,
            base_url,
            key,
            group,
            timeout,
        })
    }

    fn build_url(&self, notification: &Notification) -> Result<Url, String> {
        if self.base_url.cannot_be_a_base() {
            return Err(format!("Push URL cannot be a base: {}", self.base_url));
        }

        // Encoded up front: `Url` would strip raw newlines from the body
        let path = format!(
            "{}/{}/{}/{}",
            self.base_url.path().trim_end_matches('/'),
            urlencoding::encode(&self.key),
            urlencoding::encode(&notification.title),
            urlencoding::encode(&notification.body),
        );

        let mut url = self.base_url.clone();
        url.set_path(&path);
        url.query_pairs_mut().clear().append_pair("group", &self.group);
        Ok(url)
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), String> {
        let url = self.build_url(notification)?;

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            tracing::warn!("Bark returned status: {}", response.status());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "Bark"
    }
}
