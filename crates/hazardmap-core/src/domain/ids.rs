//! Domain identifiers (strongly-typed IDs).
//!
//! # 二種類の ID
//! - **DedupKey**: 住所から導出されるキャッシュキー（Result Store の主キー）
//! - **Id<T>**: ULID ベースの生成 ID（`JobId`, `LookupId`）
//!
//! ## Phantom Type パターン
//! `Id<T>` は共通実装を一つにまとめつつ、`T` をマーカー型として
//! `JobId` と `LookupId` を混同できないようにしています。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"job-", "lookup-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID ベースのジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Job（Job Channel に流れる 1 メッセージ）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// 生成 ID 方式の dedup key に使うマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lookup {}

impl IdMarker for Lookup {
    fn prefix() -> &'static str {
        "lookup-"
    }
}

/// Identifier of a published job (one message on the channel).
pub type JobId = Id<Job>;

/// Store-generated opaque identifier (generated-id dedup scheme).
pub type LookupId = Id<Lookup>;

/// DedupKey は LookupRecord の主キー
///
/// 一度割り当てられたら不変。同じ生の住所文字列は常に同じキーに解決されます。
/// 中身は URL やファイル名にそのまま使える文字（英数字, `-`, `_`）のみ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Wrap an externally supplied key (e.g. from a fetch request).
    ///
    /// Returns `None` for an empty key or one with characters outside
    /// `[A-Za-z0-9_-]`, so a key can never escape a store directory.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        raw.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            .then(|| Self(raw.to_string()))
    }

    /// Address-digest scheme: `addr-z<zoom>-` + URL-safe base64 of SHA-256(address).
    ///
    /// Exact text only; `"東京都 千代田区"` and `"東京都千代田区"` get different keys.
    /// The same address at another zoom level is another lookup.
    pub fn for_address(address: &str, zoom: u8) -> Self {
        Self(format!("addr-z{zoom}-{}", address_digest(address)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<LookupId> for DedupKey {
    fn from(id: LookupId) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// URL-safe base64 (no padding) of SHA-256 over the UTF-8 address text.
pub fn address_digest(address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ids_are_distinct_types() {
        let job = JobId::from_ulid(Ulid::new());
        let lookup = LookupId::from_ulid(Ulid::new());

        assert!(job.to_string().starts_with("job-"));
        assert!(lookup.to_string().starts_with("lookup-"));
        // let _: JobId = lookup; // <- does not compile
    }

    #[test]
    fn lookup_id_converts_into_dedup_key() {
        let ulid = Ulid::new();
        let key: DedupKey = LookupId::from_ulid(ulid).into();
        assert_eq!(key.as_str(), format!("lookup-{ulid}"));
        assert_eq!(DedupKey::parse(key.as_str()), Some(key));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::path_traversal("../etc/passwd")]
    #[case::slash("addr/abc")]
    #[case::japanese("東京都")]
    fn parse_rejects_unsafe_keys(#[case] raw: &str) {
        assert_eq!(DedupKey::parse(raw), None);
    }

    #[test]
    fn address_key_is_deterministic_and_exact() {
        let a = DedupKey::for_address("東京都千代田区千代田1-1", 17);
        let b = DedupKey::for_address("東京都千代田区千代田1-1", 17);
        let c = DedupKey::for_address("東京都千代田区 千代田1-1", 17);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("addr-z17-"));
        // 32 bytes -> 43 base64 chars
        assert_eq!(a.as_str().len(), "addr-z17-".len() + 43);
        assert_eq!(DedupKey::parse(a.as_str()), Some(a));
    }

    #[test]
    fn address_key_depends_on_zoom() {
        let z17 = DedupKey::for_address("東京都千代田区千代田1-1", 17);
        let z15 = DedupKey::for_address("東京都千代田区千代田1-1", 15);
        assert_ne!(z17, z15);
        assert!(z15.as_str().starts_with("addr-z15-"));
    }

    #[test]
    fn dedup_key_serializes_as_plain_string() {
        let key = DedupKey::parse("addr-abc_DEF-123").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"addr-abc_DEF-123\"");
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<JobId>(), size_of::<Ulid>());
        assert_eq!(size_of::<LookupId>(), 16);
    }
}
