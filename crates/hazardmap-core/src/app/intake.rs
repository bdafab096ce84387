//! IntakeHandler - 住所を受け付け、dedup key を即座に返す
//!
//! # 流れ
//! 1. 同じ (住所, zoom) の既存レコードを探す（あればそのキーを返す。ジョブは出さない）
//! 2. キーを導出し、Pending レコードを create-if-absent で作る
//! 3. 作れた側だけがジョブを publish する
//!
//! 競合の裁定は store の create_pending に任せます。
//! ここではロックを取りません。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::app::dedup::KeyDeriver;
use crate::domain::errors::ErrorKind;
use crate::domain::{DedupKey, FailureReason, LookupJob};
use crate::ports::{ChannelError, JobChannel, ResultStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("address is empty")]
    InvalidInput,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::InvalidInput => ErrorKind::InvalidInput,
            IntakeError::Store(_) | IntakeError::Channel(_) => ErrorKind::TransientFault,
        }
    }
}

pub struct IntakeHandler {
    store: Arc<dyn ResultStore>,
    channel: Arc<dyn JobChannel>,
    keys: KeyDeriver,
    zoom: u8,
}

impl IntakeHandler {
    pub fn new(
        store: Arc<dyn ResultStore>,
        channel: Arc<dyn JobChannel>,
        keys: KeyDeriver,
        zoom: u8,
    ) -> Self {
        Self {
            store,
            channel,
            keys,
            zoom,
        }
    }

    /// Accept `address` and return the key to poll with.
    ///
    /// The address text is used as-is. Whitespace-only text is accepted
    /// and left for the normalizer to reject.
    pub async fn intake(&self, address: &str) -> Result<DedupKey, IntakeError> {
        if address.is_empty() {
            return Err(IntakeError::InvalidInput);
        }

        if let Some(existing) = self
            .store
            .find_by_original_address(address, self.zoom)
            .await?
        {
            if self.store.exists(&existing).await? {
                debug!(dedup_key = %existing, "address already known");
                return Ok(existing);
            }
            warn!(dedup_key = %existing, "address index points at a missing record, creating a new one");
        }

        let key = self.keys.derive(address, self.zoom);
        if self.store.exists(&key).await? {
            debug!(dedup_key = %key, "record already exists");
            return Ok(key);
        }

        match self.store.create_pending(&key, address, self.zoom).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(winner)) => {
                debug!(dedup_key = %winner, "lost create race, reusing existing record");
                return Ok(winner);
            }
            Err(e) => return Err(e.into()),
        }

        let job = LookupJob::new(key.clone(), address, self.zoom);
        match self.channel.publish(job).await {
            Ok(job_id) => {
                info!(dedup_key = %key, %job_id, scheme = %self.keys.scheme(), "lookup accepted");
                Ok(key)
            }
            Err(e) => {
                error!(dedup_key = %key, error = %e, "publish failed, marking record failed");
                let reason = FailureReason::Fault {
                    message: format!("job could not be queued: {e}"),
                };
                if let Err(store_err) = self.store.fail(&key, address, reason).await {
                    error!(dedup_key = %key, error = %store_err, "could not mark record failed");
                }
                Err(e.into())
            }
        }
    }
}
