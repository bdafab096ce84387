//! Errors - エラーの運用分類
//!
//! 各ポート/ハンドラは自分の thiserror enum を持ち、
//! `kind()` でここの分類に写像します。

use serde::{Deserialize, Serialize};

/// ErrorKind は失敗の分類
///
/// - InvalidInput: 呼び出し側の入力不備（即時に返す、永続化しない）
/// - UnrecognizedAddress / AmbiguousAddress: 正規化の精度不足（Failed として永続化）
/// - TransientFault: store / queue / network の障害（ログに残し Failed にする）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnrecognizedAddress,
    AmbiguousAddress,
    TransientFault,
}

impl ErrorKind {
    /// Caller can fix this by changing the input.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::TransientFault)
    }
}
