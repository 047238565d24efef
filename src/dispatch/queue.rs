//! Bounded dispatch queue between the evaluation pipeline and the
//! notification workers.
//!
//! Backpressure policy: when full, the oldest queued info-severity job
//! is evicted; if none is queued and the incoming job is info, the
//! incoming job is dropped; otherwise the oldest job overall is
//! evicted. Every drop is logged.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::model::{AlertSeverity, AlertType, Channel, EscalationPolicy};

/// One unit of notification work
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub alert_id: String,
    pub severity: AlertSeverity,
    pub alert_type: AlertType,
    pub channels: Vec<Channel>,
    /// Recipient IDs to notify; empty means all registered recipients
    pub recipient_ids: Vec<String>,
    pub escalation: Option<EscalationPolicy>,
}

/// Bounded multi-producer queue consumed by dispatch workers
pub struct DispatchQueue {
    inner: Mutex<VecDeque<DispatchJob>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a job; returns false when the job was dropped by the
    /// backpressure policy
    pub fn push(&self, job: DispatchJob) -> bool {
        {
            let mut queue = self.inner.lock();
            if queue.len() >= self.capacity {
                if let Some(pos) = queue
                    .iter()
                    .position(|j| j.severity == AlertSeverity::Info)
                {
                    let dropped = queue.remove(pos);
                    if let Some(d) = dropped {
                        tracing::warn!(
                            alert_id = %d.alert_id,
                            "Dispatch queue full, dropped oldest info job"
                        );
                    }
                } else if job.severity == AlertSeverity::Info {
                    tracing::warn!(
                        alert_id = %job.alert_id,
                        "Dispatch queue full, dropped incoming info job"
                    );
                    return false;
                } else if let Some(dropped) = queue.pop_front() {
                    tracing::warn!(
                        alert_id = %dropped.alert_id,
                        "Dispatch queue full, dropped oldest job"
                    );
                }
            }
            queue.push_back(job);
        }
        self.notify.notify_one();
        true
    }

    /// Dequeue the next job; returns None once closed and drained
    pub async fn pop(&self) -> Option<DispatchJob> {
        loop {
            let notified = self.notify.notified();
            {
                let mut queue = self.inner.lock();
                if let Some(job) = queue.pop_front() {
                    return Some(job);
                }
                if self.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting work and wake all waiting workers; queued jobs
    /// are still drained
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
