use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hazardmap_core::app::{
    DedupScheme, FailureCode, IntakeError, LookupError, LookupView, Pipeline, PipelineBuilder,
    Resolution,
};
use hazardmap_core::config::HazardConfig;
use hazardmap_core::domain::ids::address_digest;
use hazardmap_core::domain::{HazardLayer, LookupJob, LookupStatus, TileCoord, tile_x, tile_y};
use hazardmap_core::impls::{HttpNormalizer, InMemoryJobChannel, JsonFileResultStore};
use hazardmap_core::ports::{NormalizeError, NormalizedAddress, Normalizer, ResultStore};

/// Normalizer backed by a fixed table; unknown text normalizes to level 0.
struct TableNormalizer {
    entries: HashMap<&'static str, NormalizedAddress>,
    calls: AtomicUsize,
}

impl TableNormalizer {
    fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "東京都千代田区千代田1-1",
            address(3, "東京都", "千代田区", "千代田", "1-1", Some((35.683, 139.753))),
        );
        entries.insert(
            "東京都千代田区丸の内1-9-1",
            address(8, "東京都", "千代田区", "丸の内", "1-9-1", Some((35.6812, 139.7671))),
        );
        entries.insert(
            "東京都千代田区",
            address(2, "東京都", "千代田区", "", "", Some((35.694, 139.7536))),
        );
        Self {
            entries,
            calls: AtomicUsize::new(0),
        }
    }
}

fn address(
    level: u8,
    pref: &str,
    city: &str,
    town: &str,
    addr: &str,
    coordinate: Option<(f64, f64)>,
) -> NormalizedAddress {
    NormalizedAddress {
        level,
        lat: coordinate.map(|c| c.0),
        lng: coordinate.map(|c| c.1),
        pref: pref.to_string(),
        city: city.to_string(),
        town: town.to_string(),
        addr: addr.to_string(),
    }
}

#[async_trait]
impl Normalizer for TableNormalizer {
    async fn normalize(&self, text: &str) -> Result<NormalizedAddress, NormalizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| address(0, "", "", "", "", None)))
    }
}

fn fast_config() -> HazardConfig {
    HazardConfig {
        worker_count: 2,
        poll_interval: Duration::from_millis(10),
        poll_timeout: Duration::from_secs(5),
        ..HazardConfig::default()
    }
}

fn pipeline_with(
    normalizer: Arc<TableNormalizer>,
    channel: Arc<InMemoryJobChannel>,
    config: HazardConfig,
) -> Pipeline {
    PipelineBuilder::new()
        .config(config)
        .normalizer(normalizer)
        .channel(channel)
        .build()
        .unwrap()
}

#[tokio::test]
async fn same_address_twice_yields_one_key_and_one_job() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(Arc::new(TableNormalizer::new()), channel.clone(), fast_config());

    let first = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();
    let second = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(channel.published_count(), 1);
    assert_eq!(pipeline.fetch(first.as_str()).await.unwrap(), LookupView::Pending);
}

#[tokio::test]
async fn completed_lookup_embeds_projected_tile_indices() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(Arc::new(TableNormalizer::new()), channel, fast_config());
    let workers = pipeline.start_workers();

    let key = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();
    let view = pipeline.wait_for_terminal(&key).await.unwrap();
    workers.shutdown_and_join().await;

    let LookupView::Complete { data } = view else {
        panic!("expected a complete lookup");
    };
    let (x, y) = (tile_x(139.753, 17), tile_y(35.683, 17));
    assert_eq!((x, y), (116418, 51612));
    assert_eq!(
        data.flood,
        "https://disaportaldata.gsi.go.jp/raster/01_flood_l2_shinsuishin_data/17/116418/51612.png"
    );
    let tile = TileCoord::from_lat_lng(35.683, 139.753, 17);
    for layer in HazardLayer::ALL {
        assert!(data.layer_url(layer).ends_with(&format!("/{}/{}/{}.png", tile.zoom, tile.x, tile.y)));
    }
    assert!(data.disaportal.contains("ll=35.683,139.753"));
    assert_eq!(data.address, "東京都千代田区千代田1-1");
}

#[tokio::test]
async fn duplicate_delivery_leaves_the_same_terminal_state() {
    let normalizer = Arc::new(TableNormalizer::new());
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(normalizer.clone(), channel, fast_config());

    let key = pipeline.submit("東京都千代田区丸の内1-9-1").await.unwrap();
    let job = LookupJob::new(key.clone(), "東京都千代田区丸の内1-9-1", 17);

    assert_eq!(pipeline.resolver().resolve(&job).await, Resolution::Completed);
    let first = pipeline.lookup(&key).await.unwrap();
    assert_eq!(pipeline.resolver().resolve(&job).await, Resolution::Skipped);
    let second = pipeline.lookup(&key).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.status, LookupStatus::Complete);
    assert_eq!(normalizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_address_creates_nothing() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(Arc::new(TableNormalizer::new()), channel.clone(), fast_config());

    assert!(matches!(pipeline.submit("").await, Err(IntakeError::InvalidInput)));
    assert_eq!(channel.published_count(), 0);
    assert_eq!(pipeline.store().counts().await.unwrap().pending, 0);
}

#[tokio::test]
async fn whitespace_only_address_is_cached_as_unrecognized() {
    let normalizer = Arc::new(TableNormalizer::new());
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(normalizer.clone(), channel.clone(), fast_config());
    let workers = pipeline.start_workers();

    let key = pipeline.submit("   ").await.unwrap();
    let view = pipeline.wait_for_terminal(&key).await.unwrap();
    let again = pipeline.submit("   ").await.unwrap();
    workers.shutdown_and_join().await;

    assert!(matches!(
        view,
        LookupView::Failed {
            reason: FailureCode::Unrecognized,
            ..
        }
    ));
    assert_eq!(again, key);
    assert_eq!(channel.published_count(), 1);
    assert_eq!(normalizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unrecognized_and_ambiguous_addresses_fail() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(Arc::new(TableNormalizer::new()), channel, fast_config());
    let workers = pipeline.start_workers();

    let unknown = pipeline.submit("どこでもない場所").await.unwrap();
    let vague = pipeline.submit("東京都千代田区").await.unwrap();
    let unknown_view = pipeline.wait_for_terminal(&unknown).await.unwrap();
    let vague_view = pipeline.wait_for_terminal(&vague).await.unwrap();
    workers.shutdown_and_join().await;

    assert_eq!(
        unknown_view,
        LookupView::Failed {
            reason: FailureCode::Unrecognized,
            message: "住所が正しくありません".to_string(),
        }
    );
    assert!(matches!(
        vague_view,
        LookupView::Failed {
            reason: FailureCode::Ambiguous,
            ..
        }
    ));

    let record = pipeline.lookup(&unknown).await.unwrap();
    assert_eq!(record.status, LookupStatus::Failed);
    assert!(record.error);
    assert!(record.result.is_none());
}

#[tokio::test]
async fn whitespace_variants_are_separate_lookups() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let pipeline = pipeline_with(Arc::new(TableNormalizer::new()), channel.clone(), fast_config());

    let plain = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();
    let padded = pipeline.submit(" 東京都千代田区千代田1-1").await.unwrap();

    assert_ne!(plain, padded);
    assert_eq!(channel.published_count(), 2);
}

#[tokio::test]
async fn generated_scheme_deduplicates_concurrent_submissions() {
    let channel = Arc::new(InMemoryJobChannel::new());
    let config = HazardConfig {
        dedup_scheme: DedupScheme::GeneratedId,
        ..fast_config()
    };
    let pipeline = Arc::new(pipeline_with(
        Arc::new(TableNormalizer::new()),
        channel.clone(),
        config,
    ));

    let mut joins = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        joins.push(tokio::spawn(async move {
            pipeline.submit("東京都千代田区千代田1-1").await.unwrap()
        }));
    }
    let mut keys = Vec::new();
    for join in joins {
        keys.push(join.await.unwrap());
    }

    assert!(keys.iter().all(|k| k == &keys[0]));
    assert_eq!(channel.published_count(), 1);
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let pipeline = pipeline_with(
        Arc::new(TableNormalizer::new()),
        Arc::new(InMemoryJobChannel::new()),
        fast_config(),
    );
    assert!(matches!(
        pipeline.fetch("addr-nothing-here").await,
        Err(LookupError::NotFound(_))
    ));
    assert!(matches!(pipeline.fetch("").await, Err(LookupError::InvalidInput)));
}

#[tokio::test]
async fn file_store_serves_repeat_runs_from_cache() {
    use httptest::matchers::request;
    use httptest::responders::json_encoded;
    use httptest::{Expectation, Server};

    let server = Server::run();
    server.expect(
        Expectation::matching(request::path("/normalize"))
            .times(1)
            .respond_with(json_encoded(serde_json::json!({
                "pref": "東京都",
                "city": "千代田区",
                "town": "千代田",
                "addr": "1-1",
                "level": 3,
                "lat": 35.683,
                "lng": 139.753
            }))),
    );
    let dir = tempfile::tempdir().unwrap();
    let endpoint = server.url("/normalize").to_string();

    let mut keys = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(JsonFileResultStore::open(dir.path()).await.unwrap());
        let normalizer = Arc::new(HttpNormalizer::new(&endpoint, Duration::from_secs(5)).unwrap());
        let pipeline = PipelineBuilder::new()
            .config(fast_config())
            .store(store)
            .normalizer(normalizer)
            .build()
            .unwrap();
        let workers = pipeline.start_workers();
        let key = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();
        let view = pipeline.wait_for_terminal(&key).await.unwrap();
        workers.shutdown_and_join().await;

        assert!(matches!(view, LookupView::Complete { .. }));
        keys.push(key);
    }

    assert_eq!(keys[0], keys[1]);
    let store = JsonFileResultStore::open(dir.path()).await.unwrap();
    assert_eq!(store.counts().await.unwrap().complete, 1);
}

#[tokio::test]
async fn zoom_change_resolves_again_against_the_same_store() {
    let dir = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(TableNormalizer::new());

    let mut keys = Vec::new();
    for zoom in [17u8, 15] {
        let store = Arc::new(JsonFileResultStore::open(dir.path()).await.unwrap());
        let pipeline = PipelineBuilder::new()
            .config(HazardConfig {
                zoom_level: zoom,
                ..fast_config()
            })
            .store(store)
            .normalizer(normalizer.clone())
            .build()
            .unwrap();
        let workers = pipeline.start_workers();
        let key = pipeline.submit("東京都千代田区千代田1-1").await.unwrap();
        let view = pipeline.wait_for_terminal(&key).await.unwrap();
        workers.shutdown_and_join().await;

        let LookupView::Complete { data } = view else {
            panic!("expected a complete lookup");
        };
        let tile = TileCoord::from_lat_lng(35.683, 139.753, zoom);
        assert!(data.flood.ends_with(&format!("/{zoom}/{}/{}.png", tile.x, tile.y)));
        assert_eq!(pipeline.lookup(&key).await.unwrap().zoom, zoom);
        keys.push(key);
    }

    assert_ne!(keys[0], keys[1]);
    assert_eq!(normalizer.calls.load(Ordering::SeqCst), 2);
    let store = JsonFileResultStore::open(dir.path()).await.unwrap();
    assert_eq!(store.counts().await.unwrap().complete, 2);
}

#[tokio::test]
async fn address_index_left_without_record_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let address = "東京都千代田区千代田1-1";
    std::fs::create_dir_all(dir.path().join("addresses")).unwrap();
    std::fs::write(
        dir.path()
            .join("addresses")
            .join(format!("z17-{}", address_digest(address))),
        "addr-z17-crashed",
    )
    .unwrap();

    let channel = Arc::new(InMemoryJobChannel::new());
    let store = Arc::new(JsonFileResultStore::open(dir.path()).await.unwrap());
    let pipeline = PipelineBuilder::new()
        .config(fast_config())
        .store(store)
        .channel(channel.clone())
        .normalizer(Arc::new(TableNormalizer::new()))
        .build()
        .unwrap();

    let key = pipeline.submit(address).await.unwrap();
    assert_eq!(channel.published_count(), 1);
    assert_eq!(pipeline.fetch(key.as_str()).await.unwrap(), LookupView::Pending);

    let workers = pipeline.start_workers();
    let view = pipeline.wait_for_terminal(&key).await.unwrap();
    workers.shutdown_and_join().await;
    assert!(matches!(view, LookupView::Complete { .. }));
    assert_eq!(pipeline.submit(address).await.unwrap(), key);
    assert_eq!(channel.published_count(), 1);
}
