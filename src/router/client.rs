//! Router JSON-over-HTTP client
//!
//! Every call is a POST with a JSON body. Responses carry an `error_code`
//! (0 on success); the session token (`stok`) is embedded in the URL path of
//! authenticated endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{RouterApi, SESSION_EXPIRED_CODE};
use crate::error::{AppError, RouterError};
use crate::models::{Device, Snapshot};

pub struct RouterClient {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    error_code: i64,
    stok: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostsResponse {
    error_code: i64,
    hosts_info: Option<HostsInfo>,
}

#[derive(Debug, Deserialize)]
struct HostsInfo {
    #[serde(default)]
    online_host: Vec<HashMap<String, RawHost>>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    mac: String,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    hostname: String,
}

impl RouterClient {
    pub fn new(router_addr: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .no_proxy() // Router is on the LAN
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: format!("http://{}", router_addr.trim_end_matches('/')),
        })
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<String, RouterError> {
        let resp = self.http_client.post(url).json(body).send().await?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl RouterApi for RouterClient {
    async fn login(&self, password: &str) -> Result<String, RouterError> {
        let url = format!("{}/", self.base_url);
        let body = serde_json::json!({
            "method": "do",
            "login": { "password": password }
        });

        let text = self.post(&url, &body).await?;
        parse_login_response(&text)
    }

    async fn online_hosts(&self, token: &str) -> Result<Snapshot, RouterError> {
        let url = format!("{}/stok={}/ds", self.base_url, token);
        let body = serde_json::json!({
            "hosts_info": { "table": "online_host" },
            "network": { "name": "iface_mac" },
            "method": "get"
        });

        let text = self.post(&url, &body).await?;
        parse_online_hosts_response(&text)
    }
}

fn parse_login_response(text: &str) -> Result<String, RouterError> {
    let resp: LoginResponse = serde_json::from_str(text)
        .map_err(|e| RouterError::Fetch(format!("Login parse failed: {}", e)))?;

    if resp.error_code != 0 {
        return Err(RouterError::Auth {
            code: resp.error_code,
        });
    }

    resp.stok
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RouterError::Fetch("No stok in login response".to_string()))
}

fn parse_online_hosts_response(text: &str) -> Result<Snapshot, RouterError> {
    let resp: HostsResponse = serde_json::from_str(text)
        .map_err(|e| RouterError::Fetch(format!("Online hosts parse failed: {}", e)))?;

    match resp.error_code {
        0 => {}
        SESSION_EXPIRED_CODE => {
            return Err(RouterError::Auth {
                code: resp.error_code,
            })
        }
        code => {
            return Err(RouterError::Fetch(format!(
                "Online hosts error_code {}",
                code
            )))
        }
    }

    let info = resp
        .hosts_info
        .ok_or_else(|| RouterError::Fetch("No hosts_info in response".to_string()))?;

    // Each entry is a single-key object wrapping the host record
    let snapshot = info
        .online_host
        .into_iter()
        .filter_map(|entry| entry.into_values().next())
        .map(|raw| {
            let device = Device::new(raw.mac, raw.ip, decode_hostname(&raw.hostname));
            (device.mac.clone(), device)
        })
        .collect();

    Ok(snapshot)
}

/// Percent-decode a router-reported hostname; invalid UTF-8 is replaced
fn decode_hostname(raw: &str) -> String {
    let bytes = urlencoding::decode_binary(raw.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}
