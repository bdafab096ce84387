//! Subscription - JobChannel からジョブを受け取り handler に渡すワーカー群
//!
//! # 学習ポイント
//! - watch チャネルで全ワーカーに停止を伝える
//! - `select!` で「受信待ち」と「停止要求」を競合させる
//! - handler の結果に関わらず ack（失敗はレコード側に記録済み）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::LookupJob;
use crate::ports::{ChannelError, JobChannel};

/// 1 ジョブを処理する側
///
/// 失敗は自分で記録する。Subscription は結果を見ない。
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &LookupJob);
}

/// Worker group handle.
/// - `request_shutdown()` で新しい受信を止める
/// - `shutdown_and_join()` で実行中の handler の終了まで待つ
pub struct Subscription {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `n` workers; each waits up to `poll` per receive.
    pub fn spawn(
        n: usize,
        channel: Arc<dyn JobChannel>,
        handler: Arc<dyn JobHandler>,
        poll: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let channel = Arc::clone(&channel);
            let handler = Arc::clone(&handler);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, channel, handler, poll, &mut rx).await;
            }));
        }
        info!(workers = n, "subscription started");

        Self { shutdown_tx, joins }
    }

    pub fn worker_count(&self) -> usize {
        self.joins.len()
    }

    /// Stop taking new jobs. In-flight handlers run to completion.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        debug!("subscription stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    channel: Arc<dyn JobChannel>,
    handler: Arc<dyn JobHandler>,
    poll: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let received = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = channel.receive(poll) => received,
        };

        let lease = match received {
            Ok(Some(lease)) => lease,
            Ok(None) => continue,
            Err(ChannelError::Closed) => {
                debug!(worker_id, "channel closed, worker exiting");
                break;
            }
            Err(e) => {
                warn!(worker_id, error = %e, "receive failed");
                tokio::time::sleep(poll.min(Duration::from_secs(1))).await;
                continue;
            }
        };

        let job = lease.job().clone();
        debug!(worker_id, job_id = %lease.job_id(), dedup_key = %job.dedup_key, "job received");
        handler.handle(&job).await;

        if let Err(e) = lease.ack().await {
            warn!(worker_id, dedup_key = %job.dedup_key, error = %e, "ack failed");
        }
    }
}
