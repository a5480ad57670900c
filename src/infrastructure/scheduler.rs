//! Per-chat job scheduling on top of tokio tasks
//!
//! Each `(chat, kind)` pair holds at most one job. Scheduling a job of a kind
//! that is already pending replaces it. A running job has already released
//! its slot, so nothing it does can cancel itself.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::domain::ChatId;

/// Chat id used for process-wide jobs
pub const GLOBAL_CHAT: ChatId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    NightEnd,
    DayEnd,
    VoteEnd,
    Reminder,
    MafiaConfirm,
    Sweep,
}

/// Returned by each run of a repeating job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    Continue,
    Stop,
}

#[derive(Debug)]
struct JobEntry {
    id: u64,
    handle: AbortHandle,
}

type JobMap = HashMap<(ChatId, JobKind), JobEntry>;

#[derive(Debug, Default)]
pub struct JobScheduler {
    jobs: Arc<Mutex<JobMap>>,
    next_id: AtomicU64,
}

fn lock(jobs: &Mutex<JobMap>) -> std::sync::MutexGuard<'_, JobMap> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn release(jobs: &Mutex<JobMap>, key: (ChatId, JobKind), id: u64) {
    let mut map = lock(jobs);
    if map.get(&key).is_some_and(|e| e.id == id) {
        map.remove(&key);
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` once after `delay`, replacing any pending job of that kind
    pub fn schedule_once<F>(&self, chat_id: ChatId, kind: JobKind, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (chat_id, kind);
        let jobs = Arc::clone(&self.jobs);

        let mut map = lock(&self.jobs);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            release(&jobs, key, id);
            job.await;
        });

        debug!(chat_id, ?kind, delay_secs = delay.as_secs(), "Job scheduled");
        if let Some(previous) = map.insert(
            key,
            JobEntry {
                id,
                handle: task.abort_handle(),
            },
        ) {
            previous.handle.abort();
        }
    }

    /// Run `job` after `first`, then every `every` until it returns `Stop`
    pub fn schedule_repeating<F>(
        &self,
        chat_id: ChatId,
        kind: JobKind,
        first: Duration,
        every: Duration,
        job: F,
    ) where
        F: Fn() -> BoxFuture<'static, JobControl> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (chat_id, kind);
        let jobs = Arc::clone(&self.jobs);

        let mut map = lock(&self.jobs);
        let task = tokio::spawn(async move {
            tokio::time::sleep(first).await;
            loop {
                if job().await == JobControl::Stop {
                    break;
                }
                tokio::time::sleep(every).await;
            }
            release(&jobs, key, id);
        });

        debug!(chat_id, ?kind, every_secs = every.as_secs(), "Repeating job scheduled");
        if let Some(previous) = map.insert(
            key,
            JobEntry {
                id,
                handle: task.abort_handle(),
            },
        ) {
            previous.handle.abort();
        }
    }

    pub fn cancel(&self, chat_id: ChatId, kind: JobKind) -> bool {
        match lock(&self.jobs).remove(&(chat_id, kind)) {
            Some(entry) => {
                entry.handle.abort();
                debug!(chat_id, ?kind, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every job of a chat
    pub fn cancel_chat(&self, chat_id: ChatId) {
        let mut map = lock(&self.jobs);
        map.retain(|(chat, _), entry| {
            if *chat == chat_id {
                entry.handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub fn is_scheduled(&self, chat_id: ChatId, kind: JobKind) -> bool {
        lock(&self.jobs).contains_key(&(chat_id, kind))
    }

    /// Abort everything, used on shutdown
    pub fn shutdown(&self) {
        let mut map = lock(&self.jobs);
        for (_, entry) in map.drain() {
            entry.handle.abort();
        }
    }
}
