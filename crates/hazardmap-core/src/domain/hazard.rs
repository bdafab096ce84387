//! Hazard URL Builder - ハザードマップポータルサイトのタイル URL を組み立てる
//!
//! 国土地理院「重ねるハザードマップ」が配信するラスタタイルと、
//! ポータルサイトへのディープリンクを生成します。純粋な文字列整形のみ。

use serde::{Deserialize, Serialize};

use super::tile::TileCoord;

const RASTER_BASE: &str = "https://disaportaldata.gsi.go.jp/raster";
const PORTAL_BASE: &str = "https://disaportal.gsi.go.jp/maps/index.html";

/// ポータルで重ねて表示するレイヤ（固定）
const PORTAL_LAYERS: &str = "seamless%7Ctameike_raster%2C0.8%7Cflood_l2_kaokutoukai_kagan%2C0.8%7Cflood_l2_kaokutoukai_hanran%2C0.8%7Cflood_l2_keizoku%2C0.8%7Cflood_list%2C0.8%7Cflood_l1%2C0.8%7Cflood_list_l2%2C0.75%7Cdosha_kiken_nadare%2C0.8%7Cdosha_kiken_jisuberi%2C0.8%7Cdosha_kiken_kyukeisha%2C0.8%7Cdosha_kiken_dosekiryu%2C0.8%7Cdosha_keikai_jisuberi%2C0.8%7Cdosha_keikai_dosekiryu%2C0.8%7Cdosha_keikai_kyukeisha%2C0.8%7Cdisaster1%7Cdisaster2";
const PORTAL_DISP: &str = "01000001111111100";
const PORTAL_VS: &str = "c1j0l0u0t0h0z0";

/// ラスタタイルとして配信されるハザードレイヤ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardLayer {
    /// 洪水浸水想定区域
    Flood,
    /// 高潮浸水想定区域
    HighTide,
    /// 津波浸水想定
    Tsunami,
    /// 土砂災害警戒区域（土石流）
    DebrisFlowWarning,
    /// 土砂災害警戒区域（急傾斜地の崩壊）
    SteepSlopeWarning,
    /// 土砂災害警戒区域（地すべり）
    LandslideWarning,
    /// 土石流危険渓流
    DebrisFlowStream,
    /// 急傾斜地崩壊危険箇所
    SteepSlopeCollapse,
    /// 地すべり危険箇所
    LandslideSite,
    /// 雪崩危険箇所
    AvalancheSite,
}

impl HazardLayer {
    pub const ALL: [HazardLayer; 10] = [
        HazardLayer::Flood,
        HazardLayer::HighTide,
        HazardLayer::Tsunami,
        HazardLayer::DebrisFlowWarning,
        HazardLayer::SteepSlopeWarning,
        HazardLayer::LandslideWarning,
        HazardLayer::DebrisFlowStream,
        HazardLayer::SteepSlopeCollapse,
        HazardLayer::LandslideSite,
        HazardLayer::AvalancheSite,
    ];

    /// Directory name of the layer on the raster tile server.
    pub fn dataset(self) -> &'static str {
        match self {
            HazardLayer::Flood => "01_flood_l2_shinsuishin_data",
            HazardLayer::HighTide => "03_hightide_l2_shinsuishin_data",
            HazardLayer::Tsunami => "04_tsunami_newlegend_data",
            HazardLayer::DebrisFlowWarning => "05_dosekiryukeikaikuiki",
            HazardLayer::SteepSlopeWarning => "05_kyukeishakeikaikuiki",
            HazardLayer::LandslideWarning => "05_jisuberikeikaikuiki",
            HazardLayer::DebrisFlowStream => "05_dosekiryukikenkeiryu",
            HazardLayer::SteepSlopeCollapse => "05_kyukeisyachihoukai",
            HazardLayer::LandslideSite => "05_jisuberikikenkasyo",
            HazardLayer::AvalancheSite => "05_nadarekikenkasyo",
        }
    }

    pub fn tile_url(self, tile: TileCoord) -> String {
        format!(
            "{RASTER_BASE}/{}/{}/{}/{}.png",
            self.dataset(),
            tile.zoom,
            tile.x,
            tile.y
        )
    }
}

/// ハザードマップポータルサイトが配信するデータ
///
/// 解決に成功したときに一度だけ作られ、以後は変更されません。
/// JSON のキー名はブラウザ拡張が読んでいる既存の名前に合わせています。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardData {
    /// 正規化した結果得られた住所
    pub address: String,
    pub flood: String,
    #[serde(rename = "takashio")]
    pub high_tide: String,
    pub tsunami: String,
    #[serde(rename = "dosekiryukeikai")]
    pub debris_flow_warning: String,
    #[serde(rename = "kyukeishakeikai")]
    pub steep_slope_warning: String,
    #[serde(rename = "jisuberikeikai")]
    pub landslide_warning: String,
    #[serde(rename = "dosekiryukiken")]
    pub debris_flow_stream: String,
    #[serde(rename = "kyukeisyachihoukai")]
    pub steep_slope_collapse: String,
    #[serde(rename = "jisuberikiken")]
    pub landslide_site: String,
    #[serde(rename = "nadarekiken")]
    pub avalanche_site: String,
    /// ハザードマップポータルサイト
    pub disaportal: String,
}

impl HazardData {
    pub fn layer_url(&self, layer: HazardLayer) -> &str {
        match layer {
            HazardLayer::Flood => &self.flood,
            HazardLayer::HighTide => &self.high_tide,
            HazardLayer::Tsunami => &self.tsunami,
            HazardLayer::DebrisFlowWarning => &self.debris_flow_warning,
            HazardLayer::SteepSlopeWarning => &self.steep_slope_warning,
            HazardLayer::LandslideWarning => &self.landslide_warning,
            HazardLayer::DebrisFlowStream => &self.debris_flow_stream,
            HazardLayer::SteepSlopeCollapse => &self.steep_slope_collapse,
            HazardLayer::LandslideSite => &self.landslide_site,
            HazardLayer::AvalancheSite => &self.avalanche_site,
        }
    }
}

/// Portal deep link centred on the raw coordinate.
pub fn portal_url(lat: f64, lng: f64, zoom: u8) -> String {
    format!(
        "{PORTAL_BASE}?ll={lat},{lng}&z={zoom}&base=pale&ls={PORTAL_LAYERS}&disp={PORTAL_DISP}&vs={PORTAL_VS}"
    )
}

/// 正規化済みの住所と座標から `HazardData` を組み立てる
///
/// タイル番号は一度だけ計算し、全レイヤで共有します。
pub fn build_hazard_data(canonical_address: &str, lat: f64, lng: f64, zoom: u8) -> HazardData {
    let tile = TileCoord::from_lat_lng(lat, lng, zoom);
    HazardData {
        address: canonical_address.to_string(),
        flood: HazardLayer::Flood.tile_url(tile),
        high_tide: HazardLayer::HighTide.tile_url(tile),
        tsunami: HazardLayer::Tsunami.tile_url(tile),
        debris_flow_warning: HazardLayer::DebrisFlowWarning.tile_url(tile),
        steep_slope_warning: HazardLayer::SteepSlopeWarning.tile_url(tile),
        landslide_warning: HazardLayer::LandslideWarning.tile_url(tile),
        debris_flow_stream: HazardLayer::DebrisFlowStream.tile_url(tile),
        steep_slope_collapse: HazardLayer::SteepSlopeCollapse.tile_url(tile),
        landslide_site: HazardLayer::LandslideSite.tile_url(tile),
        avalanche_site: HazardLayer::AvalancheSite.tile_url(tile),
        disaportal: portal_url(lat, lng, zoom),
    }
}
