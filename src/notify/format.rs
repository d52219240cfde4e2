//! Notification text rendering

use chrono::{DateTime, TimeZone};

use crate::models::{Device, KnownDevices};
use crate::presence::Transitions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Render a notification for one set of transitions.
///
/// `current` is the MAC list of the latest snapshot. Every list is ordered by
/// the IP string compared byte-wise, so "10.0.0.10" sorts before "10.0.0.9".
pub fn render<Tz>(
    now: &DateTime<Tz>,
    current: &[String],
    transitions: &Transitions,
    known: &KnownDevices,
) -> Notification
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut title = Vec::new();
    let mut body = vec![now.format("%Y-%m-%d %H:%M:%S").to_string()];

    for (macs, action) in [
        (&transitions.became_online, "online"),
        (&transitions.became_offline, "offline"),
    ] {
        if macs.is_empty() {
            continue;
        }
        title.push(format!("{} devices {}", macs.len(), action));
        body.push(format!("{} devices {}:", macs.len(), action));
        render_list(&mut body, macs, known);
    }

    body.push("Currently online devices:".to_string());
    render_list(&mut body, current, known);

    Notification {
        title: title.join(", "),
        body: body.join("\n"),
    }
}

fn render_list(lines: &mut Vec<String>, macs: &[String], known: &KnownDevices) {
    let mut devices: Vec<(&str, Option<&Device>)> = macs
        .iter()
        .map(|mac| (mac.as_str(), known.get(mac)))
        .collect();

    devices.sort_by(|a, b| {
        let ip_a = a.1.map(|d| d.ip.as_str()).unwrap_or("");
        let ip_b = b.1.map(|d| d.ip.as_str()).unwrap_or("");
        ip_a.cmp(ip_b).then_with(|| a.0.cmp(b.0))
    });

    for (i, (mac, device)) in devices.into_iter().enumerate() {
        let (ip, hostname) = device
            .map(|d| (d.ip.as_str(), d.hostname.as_str()))
            .unwrap_or(("", ""));
        lines.push(format!("{}. {} *{}* {}", i + 1, mac, ip, hostname));
    }
}
