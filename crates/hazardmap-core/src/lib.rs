//! hazardmap-core
//!
//! 住所からハザードマップのタイル URL を引く、重複排除付きパイプライン。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tile, hazard, record, job, errors）
//! - **ports**: 抽象化レイヤー（ResultStore, JobChannel, Normalizer, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（intake, resolver, lookup, subscription, builder）
//! - **impls**: 実装（インメモリ / JSON ファイル / HTTP）
//! - **config**: 環境変数からの設定読み込み
//!
//! # 流れ
//! ```text
//! submit(address) ─▶ IntakeHandler ─▶ ResultStore (Pending)
//!                          │
//!                          ▼
//!                     JobChannel ─▶ ResolutionWorker ─▶ Normalizer
//!                                          │
//!                                          ▼
//!                                   ResultStore (Complete | Failed)
//!
//! fetch(key) ─▶ LookupHandler ─▶ ResultStore
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
