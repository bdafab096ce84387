//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryResultStore**: テスト・開発用の正本
//! - **JsonFileResultStore**: ディレクトリに永続化する正本
//! - **InMemoryJobChannel**: プロセス内の配送キュー（at-least-once）
//! - **HttpNormalizer**: HTTP の住所正規化サービス

pub mod file_store;
pub mod http_normalizer;
pub mod inmem_channel;
pub mod inmem_store;

pub use self::file_store::JsonFileResultStore;
pub use self::http_normalizer::HttpNormalizer;
pub use self::inmem_channel::InMemoryJobChannel;
pub use self::inmem_store::InMemoryResultStore;
