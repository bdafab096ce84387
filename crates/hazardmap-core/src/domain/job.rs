//! LookupJob - Job Channel を流れる作業単位

use serde::{Deserialize, Serialize};

use super::ids::DedupKey;

/// `{dedup_key, address}` の“運搬用”データ。
///
/// address は正規化前の生の文字列。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupJob {
    pub dedup_key: DedupKey,
    pub address: String,
    pub zoom: u8,
}

impl LookupJob {
    pub fn new(dedup_key: DedupKey, address: impl Into<String>, zoom: u8) -> Self {
        Self {
            dedup_key,
            address: address.into(),
            zoom,
        }
    }
}
