//! App - アプリケーション層
//!
//! ports を組み合わせてパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **IntakeHandler**: 住所を受け付け dedup key を返す
//! - **ResolutionWorker**: ジョブを正規化し、レコードを終端状態にする
//! - **LookupHandler**: dedup key からレコード / 公開ビューを返す
//! - **Subscription**: JobChannel を消費するワーカー群
//! - **PipelineBuilder**: 構築とワイヤリング

pub mod builder;
pub mod dedup;
pub mod intake;
pub mod lookup;
pub mod resolver;
pub mod subscription;

pub use self::builder::{BuildError, Pipeline, PipelineBuilder};
pub use self::dedup::{DedupScheme, KeyDeriver};
pub use self::intake::{IntakeError, IntakeHandler};
pub use self::lookup::{FailureCode, LookupError, LookupHandler, LookupView};
pub use self::resolver::{Resolution, ResolutionWorker};
pub use self::subscription::{JobHandler, Subscription};
