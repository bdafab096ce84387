//! Ports - 抽象化レイヤー
//!
//! 外部システム（ドキュメントストア、メッセージキュー、住所正規化サービス）への
//! インターフェースを trait として定義し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ResultStore が source of truth（正本）
//! - JobChannel は `{dedup_key, address}` だけを運ぶ
//! - すべてコンストラクタで注入する（プロセス全体のグローバルは持たない）

pub mod clock;
pub mod id_generator;
pub mod job_channel;
pub mod normalizer;
pub mod result_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_channel::{ChannelError, JobChannel, JobLease};
pub use self::normalizer::{NormalizeError, NormalizedAddress, Normalizer, Precision};
pub use self::result_store::{ResultStore, StoreCounts, StoreError};
