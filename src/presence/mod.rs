//! Presence reconciliation
//!
//! Diffs each router snapshot against the set of MACs currently considered
//! online. A device that drops out of the snapshot is only reported offline
//! after it has been absent for `offline_ticks` consecutive reconciliations.

use std::collections::{HashMap, HashSet};

use crate::models::Snapshot;

/// Debounced online state, owned by the monitor loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    online: HashSet<String>,
    /// Only MACs absent from the latest snapshot that are still online
    offline_ticks: HashMap<String, u32>,
}

/// Transitions produced by one reconciliation, each list sorted by MAC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transitions {
    pub became_online: Vec<String>,
    pub became_offline: Vec<String>,
}

impl Transitions {
    /// No transitions means no notification
    pub fn is_empty(&self) -> bool {
        self.became_online.is_empty() && self.became_offline.is_empty()
    }
}

impl PresenceState {
    #[cfg(test)]
    pub fn is_online(&self, mac: &str) -> bool {
        self.online.contains(mac)
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Consecutive absent ticks for a MAC (0 when present or unknown)
    #[cfg(test)]
    pub fn offline_ticks(&self, mac: &str) -> u32 {
        self.offline_ticks.get(mac).copied().unwrap_or(0)
    }
}

/// Reconcile a snapshot against the previous state.
///
/// Takes the state by value and returns the next state together with the
/// transitions, so the caller decides when the new state becomes current.
pub fn reconcile(
    state: PresenceState,
    snapshot: &Snapshot,
    offline_threshold: u32,
) -> (PresenceState, Transitions) {
    let PresenceState {
        mut online,
        mut offline_ticks,
    } = state;

    let mut became_online: Vec<String> = snapshot
        .keys()
        .filter(|mac| !online.contains(*mac))
        .cloned()
        .collect();

    for mac in snapshot.keys() {
        offline_ticks.remove(mac);
    }

    let absent: Vec<String> = online
        .iter()
        .filter(|mac| !snapshot.contains_key(*mac))
        .cloned()
        .collect();

    let mut became_offline = Vec::new();
    for mac in absent {
        let count = offline_ticks.entry(mac.clone()).or_insert(0);
        *count += 1;

        if *count >= offline_threshold {
            offline_ticks.remove(&mac);
            online.remove(&mac);
            became_offline.push(mac);
        }
    }

    online.extend(became_online.iter().cloned());

    became_online.sort();
    became_offline.sort();

    (
        PresenceState {
            online,
            offline_ticks,
        },
        Transitions {
            became_online,
            became_offline,
        },
    )
}
