//! Escalation and notification dispatch
//!
//! Independent worker tasks consume the bounded dispatch queue so that
//! slow deliveries never block the evaluation pipeline. Each channel
//! attempt is tracked on the alert as pending -> sent ->
//! {delivered | failed | bounced}, with a retry policy for transient
//! failures and timeout-driven escalation for unacknowledged alerts.

pub mod escalation;
pub mod notifier;
pub mod queue;

pub use escalation::EscalationTracker;
pub use notifier::{DeliveryError, HttpTransport, NotificationTransport};
pub use queue::{DispatchJob, DispatchQueue};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigStore;
use crate::model::{
    Alert, AlertStatus, Channel, DeliveryState, NotificationStatus, Recipient,
};
use crate::store::AlertStore;

/// Delay growth across retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Linear,
    Exponential,
}

/// Retry policy for transient delivery failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub interval_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval_ms: 2000,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based), with up to 10% jitter
    pub fn delay(&self, retry: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.interval_ms,
            Backoff::Linear => self.interval_ms.saturating_mul(retry as u64),
            Backoff::Exponential => self
                .interval_ms
                .saturating_mul(1u64 << (retry - 1).min(16)),
        };
        let jitter = if base >= 10 {
            rand::thread_rng().gen_range(0..=base / 10)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

/// Per-recipient trailing-hour delivery counter
struct RateLimiter {
    windows: Mutex<FxHashMap<String, VecDeque<i64>>>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            windows: Mutex::new(FxHashMap::default()),
        }
    }

    /// Record a delivery if under the cap; cap 0 means unlimited
    fn try_record(&self, recipient_id: &str, cap: u32, now_ms: i64) -> bool {
        if cap == 0 {
            return true;
        }
        let mut windows = self.windows.lock();
        let window = windows.entry(recipient_id.to_string()).or_default();
        let hour_ago = now_ms - 60 * 60 * 1000;
        while window.front().map(|t| *t < hour_ago).unwrap_or(false) {
            window.pop_front();
        }
        if window.len() >= cap as usize {
            return false;
        }
        window.push_back(now_ms);
        true
    }
}

/// Notification dispatcher with worker pool and escalation tracking
pub struct Dispatcher {
    queue: Arc<DispatchQueue>,
    transport: Arc<dyn NotificationTransport>,
    store: Arc<dyn AlertStore>,
    configs: Arc<ConfigStore>,
    retry: RetryPolicy,
    escalations: EscalationTracker,
    rate: RateLimiter,
    running: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<DispatchQueue>,
        transport: Arc<dyn NotificationTransport>,
        store: Arc<dyn AlertStore>,
        configs: Arc<ConfigStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            transport,
            store,
            configs,
            retry,
            escalations: EscalationTracker::new(),
            rate: RateLimiter::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Start the worker pool and the escalation ticker
    pub fn start(
        self: &Arc<Self>,
        workers: usize,
        escalation_interval: Duration,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        self.running.store(true, Ordering::SeqCst);
        let mut handles = Vec::with_capacity(workers + 1);

        for worker_id in 0..workers {
            let dispatcher = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                tracing::debug!(worker_id, "Dispatch worker started");
                while let Some(job) = dispatcher.queue.pop().await {
                    dispatcher.process_job(job).await;
                }
                tracing::debug!(worker_id, "Dispatch worker stopped");
            }));
        }

        let dispatcher = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(escalation_interval);
            while dispatcher.running.load(Ordering::SeqCst) {
                ticker.tick().await;
                dispatcher.escalation_tick(chrono::Utc::now().timestamp_millis());
            }
        }));

        handles
    }

    /// Stop accepting new work; queued jobs and in-flight deliveries
    /// are allowed to complete
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.close();
    }

    /// Advance escalation state at the given time and enqueue the
    /// resulting notification jobs
    pub fn escalation_tick(&self, now_ms: i64) -> usize {
        let jobs = self.escalations.check(self.store.as_ref(), now_ms);
        let count = jobs.len();
        for job in jobs {
            self.queue.push(job);
        }
        count
    }

    /// Deliver one job: resolve recipients, apply preference filters
    /// and hourly caps, send on every channel, and register escalation
    pub async fn process_job(&self, job: DispatchJob) {
        let Some(alert) = self.store.get(&job.alert_id) else {
            tracing::warn!(alert_id = %job.alert_id, "Dispatch job for unknown alert");
            return;
        };
        if alert.status == AlertStatus::Suppressed || alert.status.is_terminal() {
            tracing::debug!(alert_id = %alert.id, status = ?alert.status, "Skipping dispatch");
            return;
        }

        let now_ms = chrono::Utc::now().timestamp_millis();

        if let Some(policy) = &job.escalation {
            if alert.escalation_required {
                self.escalations.register(&alert.id, policy.clone(), now_ms);
            }
        }

        let recipients = self.resolve_recipients(&job);
        let mut delivered_any = false;
        let mut attempted_any = false;

        for recipient in &recipients {
            if !recipient.prefs.accepts(job.severity, job.alert_type) {
                continue;
            }
            if !self
                .rate
                .try_record(&recipient.id, recipient.prefs.max_alerts_per_hour, now_ms)
            {
                tracing::debug!(
                    alert_id = %alert.id,
                    recipient = %recipient.id,
                    "Hourly notification cap reached"
                );
                continue;
            }

            for channel in &job.channels {
                attempted_any = true;
                if self.deliver(&alert, *channel, recipient).await {
                    delivered_any = true;
                }
            }
        }

        if attempted_any && !delivered_any {
            // Escalation (when registered) will retry at the next level;
            // otherwise this is the end of the line and must be visible
            if !self.escalations.is_tracked(&alert.id) {
                tracing::error!(
                    alert_id = %alert.id,
                    entity_id = %alert.entity_id,
                    "Unresolved dispatch failure: all channels exhausted"
                );
            }
        }
    }

    fn resolve_recipients(&self, job: &DispatchJob) -> Vec<Recipient> {
        if job.recipient_ids.is_empty() {
            return self.configs.all_recipients();
        }
        job.recipient_ids
            .iter()
            .filter_map(|id| {
                let found = self.configs.recipient(id);
                if found.is_none() {
                    tracing::warn!(recipient = %id, "Unknown recipient in dispatch job");
                }
                found
            })
            .collect()
    }

    /// One channel delivery with retries; returns true on delivery
    async fn deliver(&self, alert: &Alert, channel: Channel, recipient: &Recipient) -> bool {
        let mut status = NotificationStatus::pending(channel, recipient.id.clone());
        let _ = self.store.upsert_notification(&alert.id, status.clone());

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            status.attempts = attempt;
            status.state = DeliveryState::Sent;
            status.last_attempt_ms = Some(chrono::Utc::now().timestamp_millis());
            let _ = self.store.upsert_notification(&alert.id, status.clone());

            match self.transport.send(channel, recipient, alert).await {
                Ok(()) => {
                    status.state = DeliveryState::Delivered;
                    status.error = None;
                    let _ = self.store.upsert_notification(&alert.id, status);
                    return true;
                }
                Err(e) if e.is_retriable() && attempt <= self.retry.max_retries => {
                    status.state = DeliveryState::Failed;
                    status.error = Some(e.to_string());
                    let _ = self.store.upsert_notification(&alert.id, status.clone());
                    let delay = self.retry.delay(attempt);
                    tracing::debug!(
                        alert_id = %alert.id,
                        recipient = %recipient.id,
                        channel = ?channel,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying delivery"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    status.state = if e.is_retriable() {
                        DeliveryState::Failed
                    } else {
                        DeliveryState::Bounced
                    };
                    status.error = Some(e.to_string());
                    let _ = self.store.upsert_notification(&alert.id, status);
                    tracing::warn!(
                        alert_id = %alert.id,
                        recipient = %recipient.id,
                        channel = ?channel,
                        error = %e,
                        "Delivery failed"
                    );
                    return false;
                }
            }
        }
    }
}
