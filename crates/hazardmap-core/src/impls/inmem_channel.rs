//! InMemoryJobChannel - 開発用の配送キュー
//!
//! # 学習ポイント
//! - Notify による待機中 receiver の起床
//! - Drop で lease を返却する（ack されなかったジョブは再配送 = at-least-once）
//! - ロックは同期 Mutex。await を跨いで保持しない

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::{JobId, LookupJob};
use crate::ports::{ChannelError, IdGenerator, JobChannel, JobLease, SystemClock, UlidGenerator};

#[derive(Default)]
struct ChannelState {
    ready: VecDeque<(JobId, LookupJob)>,
    published: usize,
    redelivered: usize,
    closed: bool,
}

type SharedState = Arc<Mutex<ChannelState>>;

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// InMemoryJobChannel は開発用の配送キュー
///
/// # 使用例
/// ```ignore
/// let channel = InMemoryJobChannel::new();
/// channel.publish(job).await?;
/// let lease = channel.receive(Duration::from_secs(5)).await?;
/// ```
pub struct InMemoryJobChannel {
    state: SharedState,
    notify: Arc<Notify>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryJobChannel {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState::default())),
            notify: Arc::new(Notify::new()),
            ids,
        }
    }

    /// Total number of successful `publish` calls.
    pub fn published_count(&self) -> usize {
        lock(&self.state).published
    }

    /// Number of times a job was put back for redelivery.
    pub fn redelivered_count(&self) -> usize {
        lock(&self.state).redelivered
    }

    /// Jobs waiting to be received.
    pub fn ready_len(&self) -> usize {
        lock(&self.state).ready.len()
    }

    /// Reject further publishes; receivers drain what is left, then get `Closed`.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.notify.notify_waiters();
    }
}

impl Default for InMemoryJobChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobChannel for InMemoryJobChannel {
    async fn publish(&self, job: LookupJob) -> Result<JobId, ChannelError> {
        let job_id = self.ids.generate_job_id();
        {
            let mut state = lock(&self.state);
            if state.closed {
                return Err(ChannelError::Closed);
            }
            state.ready.push_back((job_id, job));
            state.published += 1;
        }
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<Box<dyn JobLease>>, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = lock(&self.state);
                if let Some((job_id, job)) = state.ready.pop_front() {
                    return Ok(Some(Box::new(InMemoryLease {
                        job_id,
                        job,
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                        settled: false,
                    })));
                }
                if state.closed {
                    return Err(ChannelError::Closed);
                }
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}

/// Lease implementation for InMemoryJobChannel.
struct InMemoryLease {
    job_id: JobId,
    job: LookupJob,
    state: SharedState,
    notify: Arc<Notify>,
    settled: bool,
}

impl InMemoryLease {
    fn requeue(&self) {
        {
            let mut state = lock(&self.state);
            state.ready.push_back((self.job_id, self.job.clone()));
            state.redelivered += 1;
        }
        self.notify.notify_one();
    }
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn job(&self) -> &LookupJob {
        &self.job
    }

    async fn ack(self: Box<Self>) -> Result<(), ChannelError> {
        let mut lease = self;
        lease.settled = true;
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<(), ChannelError> {
        let mut lease = self;
        lease.requeue();
        lease.settled = true;
        Ok(())
    }
}

impl Drop for InMemoryLease {
    fn drop(&mut self) {
        if !self.settled {
            self.requeue();
        }
    }
}
