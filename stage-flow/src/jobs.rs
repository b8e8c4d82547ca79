//! Detached jobs that outlive the event that started them.
//!
//! A [`JobTracker`] hands out at most one [`JobPermit`] per session key. The permit is
//! moved into a [`Launch`] together with the job future and an optional recovery hook.
//! [`Launch::spawn`] runs the job on its own task; if it panics or is cancelled the
//! recovery hook runs with the failure reason. The permit is released only after the
//! job (and its recovery) has finished.

use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

pub type DetachedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type Recovery = Box<dyn FnOnce(String) -> DetachedJob + Send + 'static>;

/// In-process registry of running jobs, keyed by session id
#[derive(Clone, Default)]
pub struct JobTracker {
    active: Arc<DashMap<String, Instant>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the key for a new job. Returns `None` while another job holds it.
    pub fn try_acquire(&self, key: &str) -> Option<JobPermit> {
        match self.active.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(JobPermit {
                    key: key.to_string(),
                    active: self.active.clone(),
                })
            }
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// How long the job for `key` has been running
    pub fn elapsed(&self, key: &str) -> Option<Duration> {
        self.active.get(key).map(|started| started.elapsed())
    }

    pub fn running(&self) -> usize {
        self.active.len()
    }
}

/// Exclusive claim on a session key; released on drop
pub struct JobPermit {
    key: String,
    active: Arc<DashMap<String, Instant>>,
}

impl JobPermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.active.remove(&self.key);
    }
}

impl fmt::Debug for JobPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobPermit").field("key", &self.key).finish()
    }
}

/// A job ready to be started, bound to the permit that guards it
pub struct Launch {
    permit: JobPermit,
    job: DetachedJob,
    recovery: Option<Recovery>,
}

impl Launch {
    pub fn new<F>(permit: JobPermit, job: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            permit,
            job: Box::pin(job),
            recovery: None,
        }
    }

    /// Run `recover` with the failure reason if the job panics or is cancelled
    pub fn with_recovery<R, Fut>(mut self, recover: R) -> Self
    where
        R: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.recovery = Some(Box::new(move |reason| Box::pin(recover(reason))));
        self
    }

    pub fn key(&self) -> &str {
        self.permit.key()
    }

    /// Start the job on its own task. The returned handle completes once the job and
    /// any recovery have run and the permit has been released.
    pub fn spawn(self) -> JoinHandle<()> {
        let Launch {
            permit,
            job,
            recovery,
        } = self;

        tokio::spawn(async move {
            let key = permit.key().to_string();
            info!(session_id = %key, "detached job started");

            match tokio::spawn(job).await {
                Ok(()) => info!(session_id = %key, "detached job finished"),
                Err(join_error) => {
                    let reason = failure_reason(join_error);
                    error!(session_id = %key, reason = %reason, "detached job aborted");
                    if let Some(recover) = recovery {
                        recover(reason).await;
                    }
                }
            }

            drop(permit);
        })
    }
}

impl fmt::Debug for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launch")
            .field("key", &self.permit.key)
            .field("has_recovery", &self.recovery.is_some())
            .finish()
    }
}

fn failure_reason(join_error: JoinError) -> String {
    if join_error.is_cancelled() {
        return "job was cancelled".to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {message}")
    } else {
        "job panicked".to_string()
    }
}
