//! Normalizer port - 住所正規化サービス（外部）
//!
//! 自由記述の住所を「都道府県 + 市区町村 + 町丁目 + 番地」と座標に変換します。
//! 正規化そのものはこのクレートでは行いません。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ErrorKind;

/// 正規化結果
///
/// `level` は正規化できた細かさ:
/// - 0: 都道府県も判別できない
/// - 1: 都道府県まで
/// - 2: 市区町村まで
/// - 3: 町丁目まで
/// - 4 以上: 番地・号まで
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    pub level: u8,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub pref: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub addr: String,
}

impl NormalizedAddress {
    pub fn precision(&self) -> Precision {
        Precision::from_level(self.level)
    }

    /// pref + city + town + addr
    pub fn canonical_address(&self) -> String {
        format!("{}{}{}{}", self.pref, self.city, self.town, self.addr)
    }

    /// Coordinate as `(lat, lng)` when the normalizer reported both.
    pub fn coordinate(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// 正規化の精度（使えるかどうか）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// level 0
    Unrecognized,
    /// level 1-2: 町丁目まで入力が必要
    Ambiguous,
    /// level 3 以上
    Usable,
}

impl Precision {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Precision::Unrecognized,
            1 | 2 => Precision::Ambiguous,
            _ => Precision::Usable,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("normalizer request failed: {0}")]
    Transport(String),

    #[error("normalizer returned an unexpected response: {0}")]
    InvalidResponse(String),
}

impl NormalizeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransientFault
    }
}

#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, address: &str) -> Result<NormalizedAddress, NormalizeError>;
}
