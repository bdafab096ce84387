//! InMemoryResultStore - 開発・テスト用の正本
//!
//! # 実装詳細
//! - `HashMap<DedupKey, LookupRecord>` が正本
//! - `HashMap<(String, u8), DedupKey>` は (original_address, zoom) の索引（二次検索用）
//! - tokio の Mutex で排他。ロック中に外部の await はしない

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DedupKey, FailureReason, HazardData, LookupRecord};
use crate::ports::{Clock, ResultStore, StoreCounts, StoreError, SystemClock};

#[derive(Default)]
struct InMemoryState {
    records: HashMap<DedupKey, LookupRecord>,
    by_address: HashMap<(String, u8), DedupKey>,
}

pub struct InMemoryResultStore {
    state: Mutex<InMemoryState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
            clock,
        }
    }

    /// Number of records (for tests and stats).
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.records.contains_key(key))
    }

    async fn find_by_original_address(
        &self,
        address: &str,
        zoom: u8,
    ) -> Result<Option<DedupKey>, StoreError> {
        let index = (address.to_string(), zoom);
        Ok(self.state.lock().await.by_address.get(&index).cloned())
    }

    async fn create_pending(
        &self,
        key: &DedupKey,
        original_address: &str,
        zoom: u8,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let index = (original_address.to_string(), zoom);
        let mut state = self.state.lock().await;
        if state.records.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.clone()));
        }
        if let Some(existing) = state.by_address.get(&index) {
            return Err(StoreError::AlreadyExists(existing.clone()));
        }
        state.by_address.insert(index, key.clone());
        state.records.insert(
            key.clone(),
            LookupRecord::pending(key.clone(), original_address.to_string(), zoom, now),
        );
        Ok(())
    }

    async fn complete(&self, key: &DedupKey, result: HazardData) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        record.mark_complete(result, now);
        Ok(())
    }

    async fn fail(
        &self,
        key: &DedupKey,
        original_address: &str,
        reason: FailureReason,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        record.mark_failed(original_address.to_string(), reason, now);
        Ok(())
    }

    async fn get(&self, key: &DedupKey) -> Result<LookupRecord, StoreError> {
        self.state
            .lock()
            .await
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let state = self.state.lock().await;
        let mut counts = StoreCounts::default();
        for record in state.records.values() {
            counts.add(record.status);
        }
        Ok(counts)
    }
}
