//! Coordinate Projector - 緯度経度からスリッピーマップのタイル番号へ
//!
//! Web メルカトル (EPSG:3857) のタイル座標系。
//! 計算式は OpenStreetMap wiki の "Slippy map tilenames" と同じです。
//!
//! 入力の範囲チェックはしません。緯度が ±90° に近いと途中の値が
//! 無限大/NaN になり、整数化の時点で飽和します（`as i64` の仕様どおり）。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// デフォルトのズームレベル
pub const DEFAULT_ZOOM: u8 = 17;

/// 受け付ける最大のズームレベル
pub const MAX_ZOOM: u8 = 24;

/// 2^zoom
fn scale(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// 経度をタイルの X 番号に変換
pub fn tile_x(lng: f64, zoom: u8) -> i64 {
    (((lng + 180.0) / 360.0) * scale(zoom)).floor() as i64
}

/// 緯度をタイルの Y 番号に変換
pub fn tile_y(lat: f64, zoom: u8) -> i64 {
    let rad = lat * PI / 180.0;
    (((1.0 - (rad.tan() + 1.0 / rad.cos()).ln() / PI) / 2.0) * scale(zoom)).floor() as i64
}

/// One tile at a given zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    pub fn from_lat_lng(lat: f64, lng: f64, zoom: u8) -> Self {
        Self {
            zoom,
            x: tile_x(lng, zoom),
            y: tile_y(lat, zoom),
        }
    }
}
