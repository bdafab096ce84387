//! JsonFileResultStore - ディレクトリに JSON ドキュメントとして保存する正本
//!
//! # レイアウト
//! ```text
//! <root>/records/<dedup_key>.json     LookupRecord
//! <root>/addresses/z<zoom>-<digest>   その (住所, zoom) を持つ dedup_key（索引）
//! ```
//!
//! # 原子性
//! - 新規作成: 一時ファイルに書いてから `hard_link`。既に存在すれば失敗するので
//!   create-if-absent の裁定をファイルシステムに任せられる
//! - 上書き: 一時ファイルに書いてから `rename`（読み手が途中の内容を見ない）
//! - レコードが先、索引が後。索引が指すキーには必ずレコードがある。
//!   途中で落ちて残った索引（レコードのない孤児）は次の create_pending が取り戻す

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::domain::ids::address_digest;
use crate::domain::{DedupKey, FailureReason, HazardData, LookupRecord};
use crate::ports::{Clock, ResultStore, StoreCounts, StoreError, SystemClock};

const RECORDS_DIR: &str = "records";
const ADDRESSES_DIR: &str = "addresses";

pub struct JsonFileResultStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileResultStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(root, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        root: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(RECORDS_DIR)).await?;
        fs::create_dir_all(root.join(ADDRESSES_DIR)).await?;
        debug!(root = %root.display(), "opened json file store");
        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &DedupKey) -> PathBuf {
        self.root
            .join(RECORDS_DIR)
            .join(format!("{}.json", key.as_str()))
    }

    fn address_path(&self, address: &str, zoom: u8) -> PathBuf {
        self.root
            .join(ADDRESSES_DIR)
            .join(format!("z{zoom}-{}", address_digest(address)))
    }

    fn temp_path(&self, dir: &str) -> PathBuf {
        self.root.join(dir).join(format!(".tmp-{}", Ulid::new()))
    }

    /// Write `bytes` to `target` only if `target` does not exist yet.
    /// Returns `false` when someone else got there first.
    async fn create_new(&self, dir: &str, target: &Path, bytes: &[u8]) -> Result<bool, StoreError> {
        let temp = self.temp_path(dir);
        fs::write(&temp, bytes).await?;
        let linked = fs::hard_link(&temp, target).await;
        fs::remove_file(&temp).await?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, dir: &str, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let temp = self.temp_path(dir);
        fs::write(&temp, bytes).await?;
        fs::rename(&temp, target).await?;
        Ok(())
    }

    async fn read_record(&self, key: &DedupKey) -> Result<LookupRecord, StoreError> {
        match fs::read(self.record_path(key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(StoreError::NotFound(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &LookupRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.replace(RECORDS_DIR, &self.record_path(&record.dedup_key), &bytes)
            .await
    }

    /// Point the (address, zoom) index at `key`.
    /// Returns the key that already owns it, if that key still has a record.
    async fn claim_index(
        &self,
        key: &DedupKey,
        address: &str,
        zoom: u8,
    ) -> Result<Option<DedupKey>, StoreError> {
        let index = self.address_path(address, zoom);
        if self
            .create_new(ADDRESSES_DIR, &index, key.as_str().as_bytes())
            .await?
        {
            return Ok(None);
        }

        let existing = match fs::read_to_string(&index).await {
            Ok(raw) => DedupKey::parse(&raw),
            Err(e) if e.kind() == IoErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(existing) = existing.as_ref() {
            if existing == key {
                return Ok(None);
            }
            if self.exists(existing).await? {
                return Ok(Some(existing.clone()));
            }
        }

        warn!(
            index = %index.display(),
            stale = ?existing.as_ref().map(DedupKey::as_str),
            dedup_key = %key,
            "reclaiming address index without a record"
        );
        self.replace(ADDRESSES_DIR, &index, key.as_str().as_bytes())
            .await?;
        Ok(None)
    }

    async fn discard_record(&self, key: &DedupKey) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ResultStore for JsonFileResultStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool, StoreError> {
        Ok(fs::try_exists(self.record_path(key)).await?)
    }

    async fn find_by_original_address(
        &self,
        address: &str,
        zoom: u8,
    ) -> Result<Option<DedupKey>, StoreError> {
        match fs::read_to_string(self.address_path(address, zoom)).await {
            Ok(raw) => Ok(DedupKey::parse(&raw)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_pending(
        &self,
        key: &DedupKey,
        original_address: &str,
        zoom: u8,
    ) -> Result<(), StoreError> {
        let record = LookupRecord::pending(
            key.clone(),
            original_address.to_string(),
            zoom,
            self.clock.now(),
        );
        let bytes = serde_json::to_vec_pretty(&record)?;
        if !self
            .create_new(RECORDS_DIR, &self.record_path(key), &bytes)
            .await?
        {
            return Err(StoreError::AlreadyExists(key.clone()));
        }

        // 同じ住所を別キーで登録しようとした側は索引で負け、自分のレコードを消す
        match self.claim_index(key, original_address, zoom).await {
            Ok(None) => Ok(()),
            Ok(Some(existing)) => {
                self.discard_record(key).await?;
                Err(StoreError::AlreadyExists(existing))
            }
            Err(e) => {
                if let Err(cleanup) = self.discard_record(key).await {
                    warn!(dedup_key = %key, error = %cleanup, "could not roll back pending record");
                }
                Err(e)
            }
        }
    }

    async fn complete(&self, key: &DedupKey, result: HazardData) -> Result<(), StoreError> {
        let mut record = self.read_record(key).await?;
        record.mark_complete(result, self.clock.now());
        self.write_record(&record).await
    }

    async fn fail(
        &self,
        key: &DedupKey,
        original_address: &str,
        reason: FailureReason,
    ) -> Result<(), StoreError> {
        let mut record = self.read_record(key).await?;
        record.mark_failed(original_address.to_string(), reason, self.clock.now());
        self.write_record(&record).await
    }

    async fn get(&self, key: &DedupKey) -> Result<LookupRecord, StoreError> {
        self.read_record(key).await
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let mut counts = StoreCounts::default();
        let mut entries = fs::read_dir(self.root.join(RECORDS_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let record: LookupRecord = serde_json::from_slice(&fs::read(&path).await?)?;
            counts.add(record.status);
        }
        Ok(counts)
    }
}
