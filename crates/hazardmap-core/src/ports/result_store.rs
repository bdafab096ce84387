//! ResultStore port - LookupRecord の正本（source of truth）
//!
//! # 設計原則
//! - create-if-absent の原子性だけが「最初の書き手が勝つ」を決める
//!   （アプリ側のロックには頼らない）
//! - complete / fail は冪等な上書き（再配送で二回走っても壊れない）
//! - レコードは削除しない（キャッシュとして無期限に保持）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ErrorKind;
use crate::domain::{DedupKey, FailureReason, HazardData, LookupRecord, LookupStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key, or the original address, already has a record.
    /// Carries the key of the existing record.
    #[error("record already exists: {0}")]
    AlreadyExists(DedupKey),

    #[error("record not found: {0}")]
    NotFound(DedupKey),

    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::TransientFault,
        }
    }
}

/// Record counts by status (for stats output).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub pending: usize,
    pub complete: usize,
    pub failed: usize,
}

impl StoreCounts {
    pub fn add(&mut self, status: LookupStatus) {
        match status {
            LookupStatus::Pending => self.pending += 1,
            LookupStatus::Complete => self.complete += 1,
            LookupStatus::Failed => self.failed += 1,
        }
    }
}

/// Durable key-value store of lookup records.
///
/// All operations must be safe under concurrent callers.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn exists(&self, key: &DedupKey) -> Result<bool, StoreError>;

    /// Secondary lookup by the address text as submitted, at one zoom level.
    async fn find_by_original_address(
        &self,
        address: &str,
        zoom: u8,
    ) -> Result<Option<DedupKey>, StoreError>;

    /// Insert a `Pending` record unless the key or the (address, zoom) pair is taken.
    async fn create_pending(
        &self,
        key: &DedupKey,
        original_address: &str,
        zoom: u8,
    ) -> Result<(), StoreError>;

    /// Overwrite the record as `Complete`.
    async fn complete(&self, key: &DedupKey, result: HazardData) -> Result<(), StoreError>;

    /// Overwrite the record as `Failed`.
    async fn fail(
        &self,
        key: &DedupKey,
        original_address: &str,
        reason: FailureReason,
    ) -> Result<(), StoreError>;

    async fn get(&self, key: &DedupKey) -> Result<LookupRecord, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}
