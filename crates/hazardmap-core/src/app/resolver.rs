//! ResolutionWorker - ジョブ 1 件を正規化し、レコードを終端状態にする
//!
//! # 設計原則
//! - 再配送されたジョブは、レコードが既に終端なら何もしない
//! - 失敗は全部レコードに書く（再キューはしない）
//! - 正規化は `normalize_timeout` で打ち切る

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::app::subscription::JobHandler;
use crate::domain::errors::ErrorKind;
use crate::domain::{DedupKey, FailureReason, LookupJob, build_hazard_data};
use crate::ports::{NormalizedAddress, Normalizer, Precision, ResultStore, StoreError};

/// What one job ended as.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Completed,
    Failed(FailureReason),
    /// Record was already terminal or missing; nothing written.
    Skipped,
}

pub struct ResolutionWorker {
    store: Arc<dyn ResultStore>,
    normalizer: Arc<dyn Normalizer>,
    normalize_timeout: Duration,
}

impl ResolutionWorker {
    pub fn new(
        store: Arc<dyn ResultStore>,
        normalizer: Arc<dyn Normalizer>,
        normalize_timeout: Duration,
    ) -> Self {
        Self {
            store,
            normalizer,
            normalize_timeout,
        }
    }

    pub async fn resolve(&self, job: &LookupJob) -> Resolution {
        let key = &job.dedup_key;
        match self.store.get(key).await {
            Ok(record) if record.status.is_terminal() => {
                debug!(dedup_key = %key, status = ?record.status, "already resolved, skipping");
                return Resolution::Skipped;
            }
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(dedup_key = %key, "job for unknown record, skipping");
                return Resolution::Skipped;
            }
            Err(e) => {
                // 読めなくても書ければ Pending のまま残さずに済む
                error!(dedup_key = %key, error = %e, "could not read record");
            }
        }

        let reason = match self.normalize(&job.address).await {
            Ok(normalized) => match self.classify(&normalized) {
                Ok((lat, lng)) => {
                    let data = build_hazard_data(&normalized.canonical_address(), lat, lng, job.zoom);
                    match self.store.complete(key, data).await {
                        Ok(()) => {
                            info!(dedup_key = %key, lat, lng, zoom = job.zoom, "lookup complete");
                            return Resolution::Completed;
                        }
                        Err(e) => {
                            error!(dedup_key = %key, error = %e, "could not store result");
                            FailureReason::Fault {
                                message: format!("result could not be stored: {e}"),
                            }
                        }
                    }
                }
                Err(reason) => reason,
            },
            Err(reason) => reason,
        };

        self.record_failure(key, &job.address, reason).await
    }

    async fn normalize(&self, address: &str) -> Result<NormalizedAddress, FailureReason> {
        match tokio::time::timeout(self.normalize_timeout, self.normalizer.normalize(address)).await {
            Ok(Ok(normalized)) => Ok(normalized),
            Ok(Err(e)) => {
                error!(error = %e, kind = ?e.kind(), "normalizer failed");
                Err(FailureReason::Fault {
                    message: e.to_string(),
                })
            }
            Err(_) => {
                error!(timeout_ms = self.normalize_timeout.as_millis() as u64, "normalizer timed out");
                Err(FailureReason::Fault {
                    message: format!(
                        "normalizer did not answer within {}ms",
                        self.normalize_timeout.as_millis()
                    ),
                })
            }
        }
    }

    /// Usable coordinate, or why the address cannot be resolved.
    fn classify(&self, normalized: &NormalizedAddress) -> Result<(f64, f64), FailureReason> {
        match normalized.precision() {
            Precision::Unrecognized => Err(FailureReason::Unrecognized),
            Precision::Ambiguous => Err(FailureReason::Ambiguous),
            Precision::Usable => normalized.coordinate().ok_or_else(|| {
                error!(level = normalized.level, "normalizer returned no coordinate");
                FailureReason::Fault {
                    message: "normalizer returned no coordinate".to_string(),
                }
            }),
        }
    }

    async fn record_failure(&self, key: &DedupKey, address: &str, reason: FailureReason) -> Resolution {
        let kind = failure_kind(&reason);
        if let Err(e) = self.store.fail(key, address, reason.clone()).await {
            error!(dedup_key = %key, error = %e, "could not mark record failed");
        } else {
            info!(dedup_key = %key, ?kind, message = reason.message(), "lookup failed");
        }
        Resolution::Failed(reason)
    }
}

fn failure_kind(reason: &FailureReason) -> ErrorKind {
    match reason {
        FailureReason::Unrecognized => ErrorKind::UnrecognizedAddress,
        FailureReason::Ambiguous => ErrorKind::AmbiguousAddress,
        FailureReason::Fault { .. } => ErrorKind::TransientFault,
    }
}

#[async_trait]
impl JobHandler for ResolutionWorker {
    async fn handle(&self, job: &LookupJob) {
        self.resolve(job).await;
    }
}
