//! JobChannel port - intake から worker への配送キュー
//!
//! # 設計原則
//! - at-least-once 配送（ack されなかった lease は再配送される）
//! - 別々のジョブ間の順序は保証しない
//! - 状態は持たない（正本は ResultStore）

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobId, LookupJob};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("channel operation failed: {0}")]
    OperationFailed(String),
}

/// A delivered job.
/// The receiver owns this lease and must either `ack` or `nack`.
/// Dropping it without either puts the job back on the channel.
#[async_trait]
pub trait JobLease: Send {
    fn job_id(&self) -> JobId;

    fn job(&self) -> &LookupJob;

    /// Processing finished; do not redeliver.
    async fn ack(self: Box<Self>) -> Result<(), ChannelError>;

    /// Give the job back for redelivery.
    async fn nack(self: Box<Self>) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait JobChannel: Send + Sync {
    async fn publish(&self, job: LookupJob) -> Result<JobId, ChannelError>;

    /// Wait up to `timeout` for one job. `Ok(None)` on timeout.
    async fn receive(&self, timeout: Duration) -> Result<Option<Box<dyn JobLease>>, ChannelError>;
}
