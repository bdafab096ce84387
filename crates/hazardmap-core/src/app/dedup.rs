//! Dedup - 住所から dedup key を決める二つの方式
//!
//! - **AddressDigest**: 住所文字列そのものから決定的に導出（既定）
//! - **GeneratedId**: 毎回新しい ID を生成し、同じ住所の既存レコードは
//!   original_address の一致検索で見つける
//!
//! どちらも「完全に同じ文字列」しか束ねません。空白や表記ゆれは別レコードになります。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::DedupKey;
use crate::ports::IdGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupScheme {
    #[default]
    AddressDigest,
    GeneratedId,
}

impl FromStr for DedupScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digest" | "address-digest" => Ok(DedupScheme::AddressDigest),
            "generated" | "generated-id" => Ok(DedupScheme::GeneratedId),
            other => Err(format!("unknown dedup scheme: {other}")),
        }
    }
}

impl fmt::Display for DedupScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupScheme::AddressDigest => f.write_str("digest"),
            DedupScheme::GeneratedId => f.write_str("generated"),
        }
    }
}

/// KeyDeriver は intake 時に候補キーを作る
///
/// GeneratedId では呼ぶたびに違うキーになるので、intake は必ず
/// `find_by_original_address` を先に引きます。
pub struct KeyDeriver {
    scheme: DedupScheme,
    ids: Arc<dyn IdGenerator>,
}

impl KeyDeriver {
    pub fn new(scheme: DedupScheme, ids: Arc<dyn IdGenerator>) -> Self {
        Self { scheme, ids }
    }

    pub fn scheme(&self) -> DedupScheme {
        self.scheme
    }

    pub fn derive(&self, address: &str, zoom: u8) -> DedupKey {
        match self.scheme {
            DedupScheme::AddressDigest => DedupKey::for_address(address, zoom),
            DedupScheme::GeneratedId => self.ids.generate_lookup_id().into(),
        }
    }
}
