//! LookupHandler - dedup key からレコードを返す（読み取り専用）
//!
//! 外部に出すときは `LookupView` に射影し、元の住所やタイムスタンプは見せません。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::errors::ErrorKind;
use crate::domain::{DedupKey, FailureReason, HazardData, LookupRecord, LookupStatus};
use crate::ports::{Clock, ResultStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("dedup key is empty or malformed")]
    InvalidInput,

    #[error("no lookup for key {0}")]
    NotFound(DedupKey),

    #[error(transparent)]
    Store(StoreError),
}

impl LookupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LookupError::InvalidInput | LookupError::NotFound(_) => ErrorKind::InvalidInput,
            LookupError::Store(_) => ErrorKind::TransientFault,
        }
    }
}

impl From<StoreError> for LookupError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => LookupError::NotFound(key),
            other => LookupError::Store(other),
        }
    }
}

/// What a caller polling a key gets to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupView {
    Pending,
    Complete {
        data: HazardData,
    },
    Failed {
        reason: FailureCode,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    Unrecognized,
    Ambiguous,
    Fault,
}

impl From<&FailureReason> for FailureCode {
    fn from(reason: &FailureReason) -> Self {
        match reason {
            FailureReason::Unrecognized => FailureCode::Unrecognized,
            FailureReason::Ambiguous => FailureCode::Ambiguous,
            FailureReason::Fault { .. } => FailureCode::Fault,
        }
    }
}

impl From<&LookupRecord> for LookupView {
    fn from(record: &LookupRecord) -> Self {
        match (record.status, &record.result, &record.failure) {
            (LookupStatus::Complete, Some(data), _) => LookupView::Complete { data: data.clone() },
            (LookupStatus::Failed, _, Some(reason)) => LookupView::Failed {
                reason: reason.into(),
                message: reason.message().to_string(),
            },
            // 理由を持たない古い Failed レコード
            (LookupStatus::Failed, _, None) => LookupView::Failed {
                reason: FailureCode::Fault,
                message: "lookup failed".to_string(),
            },
            _ => LookupView::Pending,
        }
    }
}

impl LookupView {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LookupView::Pending)
    }
}

pub struct LookupHandler {
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    stale_after: chrono::Duration,
}

impl LookupHandler {
    pub fn new(store: Arc<dyn ResultStore>, clock: Arc<dyn Clock>, stale_after: Duration) -> Self {
        Self {
            store,
            clock,
            stale_after: chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    pub async fn lookup(&self, raw_key: &str) -> Result<LookupRecord, LookupError> {
        let key = DedupKey::parse(raw_key).ok_or(LookupError::InvalidInput)?;
        self.lookup_key(&key).await
    }

    pub async fn lookup_key(&self, key: &DedupKey) -> Result<LookupRecord, LookupError> {
        let record = self.store.get(key).await?;
        if record.is_stale(self.clock.now(), self.stale_after) {
            warn!(
                dedup_key = %key,
                created_at = %record.created_at,
                "lookup has been pending longer than expected"
            );
        }
        Ok(record)
    }

    pub async fn view(&self, raw_key: &str) -> Result<LookupView, LookupError> {
        let record = self.lookup(raw_key).await?;
        Ok(LookupView::from(&record))
    }
}
