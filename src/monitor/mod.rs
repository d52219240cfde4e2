//! Monitor: fixed-interval polling loop
//!
//! Each tick fetches the online host table, reconciles it against the
//! debounced presence state and pushes a notification when any device
//! joined or left. The router session is (re)established lazily; the loop
//! aborts after too many consecutive authentication failures.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::error::{AppError, RouterError};
use crate::models::{KnownDevices, Snapshot};
use crate::notify::{self, Notifier};
use crate::presence::{self, PresenceState, Transitions};
use crate::router::RouterApi;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub tick_interval: Duration,
    pub offline_ticks: u32,
    pub max_auth_failures: u32,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick abandoned (login or fetch failed), state untouched
    Skipped,
    /// Snapshot reconciled, nothing changed
    Unchanged,
    /// Snapshot reconciled and a notification was attempted
    Changed(Transitions),
}

pub struct Monitor {
    router: Box<dyn RouterApi>,
    notifier: Box<dyn Notifier>,
    password: String,
    settings: MonitorSettings,
    token: Option<String>,
    auth_failures: u32,
    known: KnownDevices,
    presence: PresenceState,
}

impl Monitor {
    pub fn new(
        router: Box<dyn RouterApi>,
        notifier: Box<dyn Notifier>,
        password: String,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            router,
            notifier,
            password,
            settings,
            token: None,
            auth_failures: 0,
            known: KnownDevices::new(),
            presence: PresenceState::default(),
        }
    }

    #[cfg(test)]
    pub fn presence(&self) -> &PresenceState {
        &self.presence
    }

    #[cfg(test)]
    pub fn known_devices(&self) -> &KnownDevices {
        &self.known
    }

    /// Run the polling loop until an unrecoverable error
    pub async fn run(mut self) -> Result<(), AppError> {
        tracing::info!(
            "Starting presence monitor (interval: {:?}, offline after {} ticks, notifier: {})",
            self.settings.tick_interval,
            self.settings.offline_ticks,
            self.notifier.name()
        );

        let mut timer = time::interval(self.settings.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.tick().await?;
        }
    }

    /// Run one poll/reconcile/notify cycle
    pub async fn tick(&mut self) -> Result<TickOutcome, AppError> {
        let token = match self.token.clone() {
            Some(token) => token,
            None => match self.authenticate().await? {
                Some(token) => token,
                None => return Ok(TickOutcome::Skipped),
            },
        };

        let snapshot = match self.router.online_hosts(&token).await {
            Ok(snapshot) => {
                self.auth_failures = 0;
                snapshot
            }
            Err(RouterError::Auth { code }) => {
                tracing::error!(
                    "Get online hosts error: session rejected (error_code {})",
                    code
                );
                self.token = None;
                self.record_auth_failure(code)?;
                self.authenticate().await?;
                return Ok(TickOutcome::Skipped);
            }
            Err(e) => {
                tracing::error!("Get online hosts error: {}", e);
                return Ok(TickOutcome::Skipped);
            }
        };

        let transitions = self.apply_snapshot(&snapshot);
        tracing::debug!(
            "Snapshot: {} devices associated, {} considered online",
            snapshot.len(),
            self.presence.online_count()
        );

        if transitions.is_empty() {
            return Ok(TickOutcome::Unchanged);
        }

        self.notify(&snapshot, &transitions).await;
        Ok(TickOutcome::Changed(transitions))
    }

    /// Log in; `Ok(None)` abandons the tick
    async fn authenticate(&mut self) -> Result<Option<String>, AppError> {
        match self.router.login(&self.password).await {
            Ok(token) => {
                tracing::info!("Logged in to router");
                self.token = Some(token.clone());
                Ok(Some(token))
            }
            Err(RouterError::Auth { code }) => {
                tracing::error!("Login error: rejected (error_code {})", code);
                self.record_auth_failure(code)?;
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Login error: {}", e);
                Ok(None)
            }
        }
    }

    fn record_auth_failure(&mut self, code: i64) -> Result<(), AppError> {
        self.auth_failures += 1;
        tracing::warn!(
            "Consecutive authentication failures: {}/{}",
            self.auth_failures,
            self.settings.max_auth_failures
        );

        if self.auth_failures >= self.settings.max_auth_failures {
            return Err(AppError::AuthExhausted {
                attempts: self.auth_failures,
                code,
            });
        }
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Transitions {
        let (next, transitions) = presence::reconcile(
            std::mem::take(&mut self.presence),
            snapshot,
            self.settings.offline_ticks,
        );
        self.presence = next;

        // Merged, never pruned
        self.known
            .extend(snapshot.iter().map(|(mac, d)| (mac.clone(), d.clone())));

        for mac in &transitions.became_online {
            tracing::info!("Device online: {}", mac);
        }
        for mac in &transitions.became_offline {
            tracing::info!("Device offline: {}", mac);
        }

        transitions
    }

    async fn notify(&self, snapshot: &Snapshot, transitions: &Transitions) {
        let current: Vec<String> = snapshot.keys().cloned().collect();
        let notification =
            notify::render(&chrono::Local::now(), &current, transitions, &self.known);

        tracing::info!("{}\n{}", notification.title, notification.body);

        if let Err(e) = self.notifier.send(&notification).await {
            tracing::error!("Notify failed via {}: {}", self.notifier.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Device;
    use crate::notify::Notification;
    use crate::router::SESSION_EXPIRED_CODE;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    type Script<T> = Arc<Mutex<VecDeque<Result<T, RouterError>>>>;

    /// Router that replays scripted responses; an exhausted script fails
    #[derive(Clone, Default)]
    struct MockRouter {
        logins: Script<String>,
        hosts: Script<Snapshot>,
        login_calls: Arc<Mutex<u32>>,
        tokens_seen: Arc<Mutex<Vec<String>>>,
    }

    impl MockRouter {
        fn push_login(&self, result: Result<String, RouterError>) {
            self.logins.lock().unwrap().push_back(result);
        }

        fn push_hosts(&self, result: Result<Snapshot, RouterError>) {
            self.hosts.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl RouterApi for MockRouter {
        async fn login(&self, _password: &str) -> Result<String, RouterError> {
            *self.login_calls.lock().unwrap() += 1;
            self.logins
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RouterError::Fetch("no scripted login".into())))
        }

        async fn online_hosts(&self, token: &str) -> Result<Snapshot, RouterError> {
            self.tokens_seen.lock().unwrap().push(token.to_string());
            self.hosts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RouterError::Fetch("no scripted hosts".into())))
        }
    }

    #[derive(Clone, Default)]
    struct MockNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
        fail: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), String> {
            self.sent.lock().unwrap().push(notification.clone());
            if *self.fail.lock().unwrap() {
                return Err("push service unreachable".to_string());
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn monitor(router: &MockRouter, notifier: &MockNotifier) -> Monitor {
        Monitor::new(
            Box::new(router.clone()),
            Box::new(notifier.clone()),
            "secret".to_string(),
            MonitorSettings {
                tick_interval: Duration::from_millis(10),
                offline_ticks: 3,
                max_auth_failures: 3,
            },
        )
    }

    fn snapshot(devices: &[(&str, &str, &str)]) -> Snapshot {
        devices
            .iter()
            .map(|(mac, ip, hostname)| (mac.to_string(), Device::new(*mac, *ip, *hostname)))
            .collect()
    }

    #[tokio::test]
    async fn test_first_snapshot_notifies() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("stok1".into()));
        router.push_hosts(Ok(snapshot(&[("AA:BB", "10.0.0.5", "phone")])));

        let mut monitor = monitor(&router, &notifier);
        let outcome = assert_ok!(monitor.tick().await);

        assert_eq!(
            outcome,
            TickOutcome::Changed(Transitions {
                became_online: vec!["AA:BB".to_string()],
                became_offline: vec![],
            })
        );
        assert!(monitor.presence().is_online("AA:BB"));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].title.contains('1'));
        assert!(sent[0].body.contains("AA:BB"));
        assert!(sent[0].body.contains("10.0.0.5"));
        assert!(sent[0].body.contains("phone"));
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_sends_nothing() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("stok1".into()));
        let snap = snapshot(&[("AA:BB", "10.0.0.5", "phone")]);
        router.push_hosts(Ok(snap.clone()));
        router.push_hosts(Ok(snap));

        let mut monitor = monitor(&router, &notifier);
        assert_ok!(monitor.tick().await);
        let outcome = assert_ok!(monitor.tick().await);

        assert_eq!(outcome, TickOutcome::Unchanged);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(*router.login_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_untouched() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("stok1".into()));
        router.push_hosts(Ok(snapshot(&[("A", "10.0.0.2", "a")])));
        router.push_hosts(Err(RouterError::Fetch("timeout".into())));

        let mut monitor = monitor(&router, &notifier);
        assert_ok!(monitor.tick().await);
        let before = monitor.presence().clone();

        let outcome = assert_ok!(monitor.tick().await);

        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(monitor.presence(), &before);
        assert_eq!(monitor.presence().offline_ticks("A"), 0);
    }

    #[tokio::test]
    async fn test_device_offline_after_debounce() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("stok1".into()));
        router.push_hosts(Ok(snapshot(&[("A", "10.0.0.2", "a"), ("B", "10.0.0.3", "b")])));
        for _ in 0..3 {
            router.push_hosts(Ok(snapshot(&[("B", "10.0.0.3", "b")])));
        }

        let mut monitor = monitor(&router, &notifier);
        assert_ok!(monitor.tick().await);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Unchanged);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Unchanged);
        let outcome = assert_ok!(monitor.tick().await);

        assert_eq!(
            outcome,
            TickOutcome::Changed(Transitions {
                became_online: vec![],
                became_offline: vec!["A".to_string()],
            })
        );

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].title, "1 devices offline");
        // Known devices still supply display attributes for evicted MACs
        assert!(sent[1].body.contains("1. A *10.0.0.2* a"));
        assert!(monitor.known_devices().contains_key("A"));
    }

    #[tokio::test]
    async fn test_notify_failure_is_not_fatal() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        *notifier.fail.lock().unwrap() = true;
        router.push_login(Ok("stok1".into()));
        router.push_hosts(Ok(snapshot(&[("A", "10.0.0.2", "a")])));

        let mut monitor = monitor(&router, &notifier);
        let outcome = assert_ok!(monitor.tick().await);

        assert!(matches!(outcome, TickOutcome::Changed(_)));
        assert!(monitor.presence().is_online("A"));
    }

    #[tokio::test]
    async fn test_three_login_rejections_abort() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        for _ in 0..3 {
            router.push_login(Err(RouterError::Auth {
                code: SESSION_EXPIRED_CODE,
            }));
        }

        let mut monitor = monitor(&router, &notifier);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        let err = assert_err!(monitor.tick().await);

        assert!(matches!(
            err,
            AppError::AuthExhausted {
                attempts: 3,
                code: -40401
            }
        ));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_relogs_in() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("stok1".into()));
        router.push_login(Ok("stok2".into()));
        router.push_hosts(Err(RouterError::Auth {
            code: SESSION_EXPIRED_CODE,
        }));
        router.push_hosts(Ok(snapshot(&[("A", "10.0.0.2", "a")])));

        let mut monitor = monitor(&router, &notifier);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        assert!(matches!(
            assert_ok!(monitor.tick().await),
            TickOutcome::Changed(_)
        ));

        assert_eq!(*router.login_calls.lock().unwrap(), 2);
        assert_eq!(*router.tokens_seen.lock().unwrap(), vec!["stok1", "stok2"]);
    }

    #[tokio::test]
    async fn test_successful_fetch_resets_auth_failures() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        let expired = || {
            Err(RouterError::Auth {
                code: SESSION_EXPIRED_CODE,
            })
        };
        for token in ["t1", "t2", "t3", "t4"] {
            router.push_login(Ok(token.into()));
        }
        router.push_hosts(expired());
        router.push_hosts(expired());
        router.push_hosts(Ok(snapshot(&[])));
        router.push_hosts(expired());
        router.push_hosts(expired());

        let mut monitor = monitor(&router, &notifier);
        for _ in 0..5 {
            assert_ok!(monitor.tick().await);
        }
    }

    #[tokio::test]
    async fn test_transport_login_failure_not_counted() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        for _ in 0..5 {
            router.push_login(Err(RouterError::Fetch("connection refused".into())));
        }

        let mut monitor = monitor(&router, &notifier);
        for _ in 0..5 {
            assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        }
    }

    #[tokio::test]
    async fn test_three_expired_sessions_abort() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        for token in ["t1", "t2", "t3"] {
            router.push_login(Ok(token.into()));
        }
        for _ in 0..3 {
            router.push_hosts(Err(RouterError::Auth {
                code: SESSION_EXPIRED_CODE,
            }));
        }

        let mut monitor = monitor(&router, &notifier);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        let err = assert_err!(monitor.tick().await);

        assert!(matches!(
            err,
            AppError::AuthExhausted {
                attempts: 3,
                code: -40401
            }
        ));
        // Re-login after each of the first two rejections only
        assert_eq!(*router.login_calls.lock().unwrap(), 3);
        assert_eq!(*router.tokens_seen.lock().unwrap(), vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_rejected_relogin_counts_in_same_tick() {
        let router = MockRouter::default();
        let notifier = MockNotifier::default();
        router.push_login(Ok("t1".into()));
        router.push_hosts(Err(RouterError::Auth {
            code: SESSION_EXPIRED_CODE,
        }));
        router.push_login(Err(RouterError::Auth { code: -40210 }));
        router.push_login(Err(RouterError::Auth { code: -40210 }));

        let mut monitor = monitor(&router, &notifier);
        // Expired fetch and rejected re-login: two failures
        assert_eq!(assert_ok!(monitor.tick().await), TickOutcome::Skipped);
        assert_eq!(*router.login_calls.lock().unwrap(), 2);

        // No token left, the next rejected login is the third
        let err = assert_err!(monitor.tick().await);
        assert!(matches!(
            err,
            AppError::AuthExhausted {
                attempts: 3,
                code: -40210
            }
        ));
        assert_eq!(*router.tokens_seen.lock().unwrap(), vec!["t1"]);
    }
}
