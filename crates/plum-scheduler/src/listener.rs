//! Result listeners and live result subscriptions.
//!
//! Every completed execution is handed to each registered
//! [`CheckListener`] in registration order. The scheduler installs the
//! [`HealthListener`] and [`LogListener`] first; anything else joins later
//! through [`Listeners::add`] or a [`ResultStream`] subscription.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use plum_alert::{AlertDispatcher, RaiseOutcome};
use plum_core::{BoxFuture, CheckResult, CheckState};
use plum_health::{Transition, evaluate, observe};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::check::{CheckInfo, ScheduledCheck};

/// Events a subscriber can fall behind by before new ones are dropped.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Receives every check result.
///
/// `on_result` is awaited inline by the worker that ran the check, so a
/// slow listener delays that worker.
pub trait CheckListener: Send + Sync {
    fn on_result<'a>(&'a self, check: &'a ScheduledCheck, result: &'a CheckResult) -> BoxFuture<'a, ()>;
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The listener collection.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Arc<dyn CheckListener>)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn CheckListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .expect("listeners lock")
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().expect("listeners lock");
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Copy of the current listeners, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn CheckListener>> {
        self.entries
            .read()
            .expect("listeners lock")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("listeners lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Built-in listeners ────────────────────────────────────────────

/// Debounces results into the check's state and raises alerts on
/// transitions of a settled check.
pub struct HealthListener {
    dispatcher: Arc<AlertDispatcher>,
}

impl HealthListener {
    pub fn new(dispatcher: Arc<AlertDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl CheckListener for HealthListener {
    fn on_result<'a>(&'a self, check: &'a ScheduledCheck, result: &'a CheckResult) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let transition = {
                let mut status = check.status();
                let computed = evaluate(&status.history, &check.thresholds());
                let status = &mut *status;
                observe(&mut status.settled, &mut status.state, computed)
            };

            match transition {
                Transition::Unchanged => {}
                Transition::Settled(state) => {
                    info!(check = %check.name, %state, "check settled");
                }
                Transition::Changed { from, to } => {
                    info!(check = %check.name, %from, %to, "check changed state");
                    match self.dispatcher.raise(check.alert_target(), from, to, result).await {
                        RaiseOutcome::Suppressed { .. } => {}
                        RaiseOutcome::Sent { attempted, failed } => {
                            debug!(check = %check.name, attempted, failed = failed.len(), "alerts raised");
                        }
                    }
                }
            }
        })
    }
}

/// Logs each outcome, unless quiet.
pub struct LogListener {
    quiet: bool,
}

impl LogListener {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl CheckListener for LogListener {
    fn on_result<'a>(&'a self, check: &'a ScheduledCheck, result: &'a CheckResult) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.quiet {
                return;
            }
            if result.state == CheckState::Good {
                info!(check = %check.name, state = %result.state, "check result");
            } else {
                warn!(check = %check.name, state = %result.state, detail = %result.detail, "check result");
            }
        })
    }
}

// ── Subscriptions ─────────────────────────────────────────────────

/// A result delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckEvent {
    pub check: CheckInfo,
    pub result: CheckResult,
}

struct StreamListener {
    tx: mpsc::Sender<CheckEvent>,
}

impl CheckListener for StreamListener {
    fn on_result<'a>(&'a self, check: &'a ScheduledCheck, result: &'a CheckResult) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let event = CheckEvent {
                check: check.info(),
                result: result.clone(),
            };
            if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(event) {
                debug!(check = %check.name, "subscriber lagging, result dropped");
            }
        })
    }
}

/// A live stream of results. Dropping it unsubscribes.
pub struct ResultStream {
    id: ListenerId,
    listeners: Arc<Listeners>,
    rx: mpsc::Receiver<CheckEvent>,
}

impl ResultStream {
    pub(crate) fn subscribe(listeners: Arc<Listeners>) -> Self {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = listeners.add(Arc::new(StreamListener { tx }));
        Self { id, listeners, rx }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next result. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<CheckEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        self.listeners.remove(self.id);
    }
}

impl futures_core::Stream for ResultStream {
    type Item = CheckEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use plum_core::{Check, CheckContext, CheckSettings};

    struct Noop;

    impl Check for Noop {
        fn execute<'a>(&'a self, _ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::good() })
        }
    }

    struct Tagged {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl CheckListener for Tagged {
        fn on_result<'a>(&'a self, _check: &'a ScheduledCheck, _result: &'a CheckResult) -> BoxFuture<'a, ()> {
            Box::pin(async move { self.seen.lock().unwrap().push(self.tag) })
        }
    }

    fn check() -> ScheduledCheck {
        ScheduledCheck::new("web", "test.noop", CheckSettings::default(), Arc::new(Noop)).unwrap()
    }

    async fn notify(listeners: &Listeners, check: &ScheduledCheck, result: &CheckResult) {
        for listener in listeners.snapshot() {
            listener.on_result(check, result).await;
        }
    }

    #[tokio::test]
    async fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listeners = Listeners::new();
        for tag in ["first", "second", "third"] {
            listeners.add(Arc::new(Tagged { tag, seen: seen.clone() }));
        }

        notify(&listeners, &check(), &CheckResult::good()).await;
        assert_eq!(*seen.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn remove_by_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listeners = Listeners::new();
        let a = listeners.add(Arc::new(Tagged { tag: "a", seen: seen.clone() }));
        let b = listeners.add(Arc::new(Tagged { tag: "b", seen }));
        assert_ne!(a, b);

        assert!(listeners.remove(a));
        assert!(!listeners.remove(a));
        assert_eq!(listeners.len(), 1);
    }

    #[tokio::test]
    async fn subscription_receives_until_dropped() {
        let listeners = Arc::new(Listeners::new());
        let check = check();

        let mut stream = ResultStream::subscribe(Arc::clone(&listeners));
        assert_eq!(listeners.len(), 1);

        notify(&listeners, &check, &CheckResult::failing("down")).await;
        let event = stream.recv().await.unwrap();
        assert_eq!(event.check.name, "web");
        assert_eq!(event.result.detail, "down");

        drop(stream);
        assert!(listeners.is_empty());
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_newest_events() {
        let listeners = Arc::new(Listeners::new());
        let check = check();
        let mut stream = ResultStream::subscribe(Arc::clone(&listeners));

        for _ in 0..SUBSCRIPTION_BUFFER + 5 {
            notify(&listeners, &check, &CheckResult::good()).await;
        }

        let mut received = 0;
        while let Ok(_event) = stream.rx.try_recv() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIPTION_BUFFER);
    }

    #[tokio::test]
    async fn health_listener_settles_then_changes() {
        let dispatcher = Arc::new(AlertDispatcher::default());
        let health = HealthListener::new(dispatcher);
        let check = check();

        for result in [CheckResult::good(), CheckResult::good()] {
            check.status().history.push(result.clone());
            health.on_result(&check, &result).await;
        }
        {
            let status = check.status();
            assert!(status.settled);
            assert_eq!(status.state, CheckState::Good);
        }

        for result in [CheckResult::failing("a"), CheckResult::failing("b")] {
            check.status().history.push(result.clone());
            health.on_result(&check, &result).await;
        }
        assert_eq!(check.status().state, CheckState::Failing);
    }
}
