//! Lookup record: the durable unit of state in the Result Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hazard::HazardData;
use super::ids::DedupKey;
use super::tile::DEFAULT_ZOOM;

fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}

/// Lookup status.
///
/// State transitions:
/// - Pending -> Complete
/// - Pending -> Failed
///
/// Terminal states are never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    /// Accepted, waiting for the resolution worker.
    Pending,

    /// Resolved; `result` holds the hazard data.
    Complete,

    /// Resolution failed; `failure` says why.
    Failed,
}

impl LookupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LookupStatus::Complete | LookupStatus::Failed)
    }
}

/// Why a lookup ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// 住所が正しくありません (precision level 0)
    Unrecognized,

    /// 住所が曖昧です。町丁目まで入力してください (precision level 1-2)
    Ambiguous,

    /// Normalizer, store or transport fault while resolving.
    Fault { message: String },
}

impl FailureReason {
    /// Message shown to the caller.
    pub fn message(&self) -> &str {
        match self {
            FailureReason::Unrecognized => "住所が正しくありません",
            FailureReason::Ambiguous => "住所が曖昧です。町丁目まで入力してください",
            FailureReason::Fault { message } => message,
        }
    }
}

/// One lookup, keyed by its dedup key.
///
/// Design:
/// - Created once by intake (Pending), mutated once by the worker.
/// - `result` is only ever set together with `Complete`.
/// - `error` / `failure` are only ever set together with `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub dedup_key: DedupKey,
    pub status: LookupStatus,
    pub original_address: String,
    /// Zoom level the tile URLs are (to be) built at.
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    pub result: Option<HazardData>,
    pub error: bool,
    #[serde(default)]
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LookupRecord {
    pub fn pending(
        dedup_key: DedupKey,
        original_address: String,
        zoom: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            dedup_key,
            status: LookupStatus::Pending,
            original_address,
            zoom,
            result: None,
            error: false,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as complete.
    ///
    /// Overwrites an earlier result for the same key, so a redelivered job can
    /// write again without corrupting the record.
    pub fn mark_complete(&mut self, result: HazardData, now: DateTime<Utc>) {
        self.status = LookupStatus::Complete;
        self.result = Some(result);
        self.error = false;
        self.failure = None;
        self.updated_at = now;
    }

    /// Mark as failed.
    pub fn mark_failed(&mut self, original_address: String, reason: FailureReason, now: DateTime<Utc>) {
        self.status = LookupStatus::Failed;
        self.original_address = original_address;
        self.result = None;
        self.error = true;
        self.failure = Some(reason);
        self.updated_at = now;
    }

    /// Pending for longer than `threshold` as of `now`?
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.status == LookupStatus::Pending && now - self.created_at > threshold
    }
}
