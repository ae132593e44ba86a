//! Scheduler — dispatch loop, worker pool, and check execution.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use plum_alert::AlertDispatcher;
use plum_core::duration::format_duration;
use plum_core::{CheckContext, CheckResult, ConfigDocument, FACT_CHECK_TIME, PluginRegistry};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use crate::check::{CheckInfo, ScheduledCheck, SuspendOutcome};
use crate::error::{SchedulerError, SchedulerResult};
use crate::listener::{CheckListener, HealthListener, ListenerId, Listeners, LogListener, ResultStream};
use crate::loader::{Registration, load};

/// Longest the dispatch loop sleeps between passes.
pub const MAX_SLEEP: Duration = Duration::from_secs(60 * 60);

/// Longest the dispatch loop sleeps while any check is suspended.
pub const SUSPENDED_SLEEP: Duration = Duration::from_secs(60);

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker tasks executing checks.
    pub workers: usize,
    /// Capacity of the work queue between the dispatch loop and workers.
    pub queue_capacity: usize,
    /// Suppress per-result log lines.
    pub quiet: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            quiet: false,
        }
    }
}

/// One pass of the dispatch loop.
#[derive(Debug)]
pub struct Plan {
    /// Checks now marked scheduled, to be queued.
    pub due: Vec<Arc<ScheduledCheck>>,
    /// How long to sleep before the next pass.
    pub sleep: Duration,
}

/// Owns the registered checks and drives their execution.
pub struct Scheduler {
    checks: Vec<Arc<ScheduledCheck>>,
    by_name: HashMap<String, usize>,
    dispatcher: Arc<AlertDispatcher>,
    listeners: Arc<Listeners>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler with the built-in health and log listeners.
    pub fn new(registration: Registration, config: SchedulerConfig) -> Self {
        let checks: Vec<_> = registration.checks.into_iter().map(Arc::new).collect();
        let by_name = checks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let dispatcher = Arc::new(registration.dispatcher);

        let listeners = Arc::new(Listeners::new());
        listeners.add(Arc::new(HealthListener::new(Arc::clone(&dispatcher))));
        listeners.add(Arc::new(LogListener::new(config.quiet)));

        Self {
            checks,
            by_name,
            dispatcher,
            listeners,
            config,
        }
    }

    /// Load a configuration and build a scheduler for it.
    pub fn from_config(
        doc: &ConfigDocument,
        plugins: &PluginRegistry,
        config: SchedulerConfig,
    ) -> SchedulerResult<Self> {
        Ok(Self::new(load(doc, plugins)?, config))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    pub(crate) fn registered(&self) -> &[Arc<ScheduledCheck>] {
        &self.checks
    }

    pub fn scheduled_check(&self, name: &str) -> Option<&Arc<ScheduledCheck>> {
        self.by_name.get(name).map(|&i| &self.checks[i])
    }

    fn find(&self, name: &str) -> SchedulerResult<&Arc<ScheduledCheck>> {
        self.scheduled_check(name)
            .ok_or_else(|| SchedulerError::CheckNotFound(name.to_string()))
    }

    // ── Remote control ─────────────────────────────────────────────

    /// All checks, in configuration order.
    pub fn checks(&self) -> Vec<CheckInfo> {
        self.checks.iter().map(|c| c.info()).collect()
    }

    pub fn check(&self, name: &str) -> SchedulerResult<CheckInfo> {
        Ok(self.find(name)?.info())
    }

    /// Stop scheduling a check. Takes effect on the next dispatch pass.
    pub fn suspend(&self, name: &str) -> SchedulerResult<SuspendOutcome> {
        self.set_suspended(name, true)
    }

    pub fn unsuspend(&self, name: &str) -> SchedulerResult<SuspendOutcome> {
        self.set_suspended(name, false)
    }

    fn set_suspended(&self, name: &str, suspended: bool) -> SchedulerResult<SuspendOutcome> {
        let check = self.find(name)?;
        let changed = check.set_suspended(suspended);
        info!(check = %name, suspended, changed, "suspension updated");
        Ok(SuspendOutcome {
            check: check.info(),
            changed,
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn CheckListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Registered listeners, the built-in ones included.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stream every result from now on until the stream is dropped.
    pub fn subscribe(&self) -> ResultStream {
        ResultStream::subscribe(Arc::clone(&self.listeners))
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Work out which checks are due at `now`, marking them scheduled.
    pub fn plan(&self, now: DateTime<Utc>) -> Plan {
        let mut due = Vec::new();
        let mut sleep = MAX_SLEEP;

        for check in &self.checks {
            let mut status = check.status();
            if status.suspended {
                sleep = sleep.min(SUSPENDED_SLEEP);
                continue;
            }

            let interval = check.config.interval;
            let remaining = if status.scheduled {
                interval
            } else {
                let remaining = ScheduledCheck::until_due(&status, interval, now);
                if remaining.is_zero() {
                    status.scheduled = true;
                    due.push(Arc::clone(check));
                    interval
                } else {
                    remaining
                }
            };
            sleep = sleep.min(remaining);
        }

        Plan { due, sleep }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// On shutdown the queue is closed and workers finish the checks that
    /// were already queued or running before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers: Vec<_> = (0..self.config.workers.max(1))
            .map(|worker| {
                let scheduler = Arc::clone(&self);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move { scheduler.work(worker, rx).await })
            })
            .collect();

        info!(checks = self.checks.len(), workers = workers.len(), "scheduler started");

        'dispatch: loop {
            if *shutdown.borrow() {
                break;
            }

            let plan = self.plan(Utc::now());
            for check in plan.due {
                debug!(check = %check.name, "check queued");
                tokio::select! {
                    sent = tx.send(check) => {
                        if sent.is_err() {
                            break 'dispatch;
                        }
                    }
                    _ = shutdown.changed() => break 'dispatch,
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(plan.sleep) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopping, draining workers");
        drop(tx);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "worker task failed");
            }
        }
        info!("scheduler stopped");
    }

    async fn work(&self, worker: usize, rx: Arc<Mutex<mpsc::Receiver<Arc<ScheduledCheck>>>>) {
        debug!(worker, "worker started");
        loop {
            let next = rx.lock().await.recv().await;
            let Some(check) = next else {
                break;
            };
            self.run_check(&check).await;
        }
        debug!(worker, "worker stopped");
    }

    /// Execute a check once and feed the result through the listeners.
    pub async fn run_check(&self, check: &ScheduledCheck) -> CheckResult {
        let started = Instant::now();
        check.status().last_run = Some(Utc::now());

        let timeout = check.effective_timeout();
        let ctx = CheckContext::new(timeout);
        let instance = Arc::clone(check.check());
        let mut task = tokio::spawn(async move { instance.execute(&ctx).await });

        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                warn!(check = %check.name, %message, "check panicked");
                CheckResult::failing(format!("PANIC: {message}"))
            }
            Ok(Err(e)) => CheckResult::failing(format!("check did not complete: {e}")),
            Err(_) => {
                task.abort();
                CheckResult::failing(format!("check timed out after {}", format_duration(timeout)))
            }
        };
        let result = result.with_fact(FACT_CHECK_TIME, started.elapsed().as_millis() as u64);

        {
            let mut status = check.status();
            status.history.push(result.clone());
            status.scheduled = false;
        }

        for listener in self.listeners.snapshot() {
            let delivered = AssertUnwindSafe(listener.on_result(check, &result))
                .catch_unwind()
                .await;
            if let Err(payload) = delivered {
                let message = panic_message(payload);
                warn!(check = %check.name, %message, "listener panicked");
            }
        }
        result
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
