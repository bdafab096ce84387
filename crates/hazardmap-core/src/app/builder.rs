//! PipelineBuilder - intake / worker / lookup の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 依存はすべて `Arc<dyn Trait>` でコンストラクタ注入

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::app::dedup::KeyDeriver;
use crate::app::intake::{IntakeError, IntakeHandler};
use crate::app::lookup::{LookupError, LookupHandler, LookupView};
use crate::app::resolver::ResolutionWorker;
use crate::app::subscription::Subscription;
use crate::config::HazardConfig;
use crate::domain::{DedupKey, LookupRecord, MAX_ZOOM};
use crate::impls::{InMemoryJobChannel, InMemoryResultStore};
use crate::ports::{Clock, IdGenerator, JobChannel, Normalizer, ResultStore, SystemClock, UlidGenerator};

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no normalizer configured. Call .normalizer(...) before build().")]
    MissingNormalizer,

    #[error("zoom level {0} is out of range (0..=24)")]
    InvalidZoom(u8),

    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// PipelineBuilder はパイプラインを構築
///
/// # 使用例
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .config(HazardConfig::from_env()?)
///     .store(Arc::new(JsonFileResultStore::open("./data").await?))
///     .normalizer(Arc::new(HttpNormalizer::new(endpoint, timeout)?))
///     .build()?;
/// ```
///
/// store / channel / clock を省略するとインメモリ実装とシステム時計を使います。
/// normalizer だけは必須です。
#[derive(Default)]
pub struct PipelineBuilder {
    config: HazardConfig,
    store: Option<Arc<dyn ResultStore>>,
    channel: Option<Arc<dyn JobChannel>>,
    normalizer: Option<Arc<dyn Normalizer>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HazardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn channel(mut self, channel: Arc<dyn JobChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # 検証
    /// - normalizer が設定されている
    /// - zoom が 0..=24
    /// - worker 数が 1 以上
    pub fn build(self) -> Result<Pipeline, BuildError> {
        let config = self.config;
        if config.zoom_level > MAX_ZOOM {
            return Err(BuildError::InvalidZoom(config.zoom_level));
        }
        if config.worker_count == 0 {
            return Err(BuildError::NoWorkers);
        }
        let normalizer = self.normalizer.ok_or(BuildError::MissingNormalizer)?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let store: Arc<dyn ResultStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryResultStore::with_clock(Arc::clone(&clock))),
        };
        let channel: Arc<dyn JobChannel> = match self.channel {
            Some(channel) => channel,
            None => Arc::new(InMemoryJobChannel::with_id_generator(Arc::clone(&ids))),
        };

        let intake = IntakeHandler::new(
            Arc::clone(&store),
            Arc::clone(&channel),
            KeyDeriver::new(config.dedup_scheme, ids),
            config.zoom_level,
        );
        let resolver = Arc::new(ResolutionWorker::new(
            Arc::clone(&store),
            normalizer,
            config.normalize_timeout,
        ));
        let lookup = LookupHandler::new(Arc::clone(&store), clock, config.pending_stale_after);

        debug!(
            zoom = config.zoom_level,
            workers = config.worker_count,
            scheme = %config.dedup_scheme,
            "pipeline built"
        );
        Ok(Pipeline {
            config,
            store,
            channel,
            intake,
            resolver,
            lookup,
        })
    }
}

/// Pipeline は組み上がった intake / worker / lookup 一式
pub struct Pipeline {
    config: HazardConfig,
    store: Arc<dyn ResultStore>,
    channel: Arc<dyn JobChannel>,
    intake: IntakeHandler,
    resolver: Arc<ResolutionWorker>,
    lookup: LookupHandler,
}

impl Pipeline {
    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn resolver(&self) -> &ResolutionWorker {
        &self.resolver
    }

    /// Submit-lookup.
    pub async fn submit(&self, address: &str) -> Result<DedupKey, IntakeError> {
        self.intake.intake(address).await
    }

    /// Fetch-result, projected for callers.
    pub async fn fetch(&self, key: &str) -> Result<LookupView, LookupError> {
        self.lookup.view(key).await
    }

    /// Full record, including internal fields.
    pub async fn lookup(&self, key: &DedupKey) -> Result<LookupRecord, LookupError> {
        self.lookup.lookup_key(key).await
    }

    /// Start `worker_count` workers consuming the channel.
    pub fn start_workers(&self) -> Subscription {
        info!(workers = self.config.worker_count, "starting resolution workers");
        Subscription::spawn(
            self.config.worker_count,
            Arc::clone(&self.channel),
            self.resolver.clone(),
            self.config.poll_interval,
        )
    }

    /// Poll `key` every `poll_interval` until it is terminal or `poll_timeout` passes.
    /// Returns the last view seen, which is `Pending` on timeout.
    pub async fn wait_for_terminal(&self, key: &DedupKey) -> Result<LookupView, LookupError> {
        self.wait_with(key, self.config.poll_interval, self.config.poll_timeout)
            .await
    }

    pub async fn wait_with(
        &self,
        key: &DedupKey,
        interval: Duration,
        timeout: Duration,
    ) -> Result<LookupView, LookupError> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = LookupView::from(&self.lookup.lookup_key(key).await?);
            if view.is_terminal() || Instant::now() >= deadline {
                return Ok(view);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{NormalizeError, NormalizedAddress};
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl Normalizer for Fixed {
        async fn normalize(&self, _address: &str) -> Result<NormalizedAddress, NormalizeError> {
            Ok(NormalizedAddress {
                level: 3,
                lat: Some(35.6812),
                lng: Some(139.7671),
                pref: "東京都".into(),
                city: "千代田区".into(),
                town: "丸の内".into(),
                addr: "1-9-1".into(),
            })
        }
    }

    #[test]
    fn build_requires_normalizer() {
        assert!(matches!(
            PipelineBuilder::new().build(),
            Err(BuildError::MissingNormalizer)
        ));
    }

    #[test]
    fn build_rejects_bad_config() {
        let config = HazardConfig {
            zoom_level: 30,
            ..HazardConfig::default()
        };
        assert!(matches!(
            PipelineBuilder::new()
                .config(config)
                .normalizer(Arc::new(Fixed))
                .build(),
            Err(BuildError::InvalidZoom(30))
        ));

        let config = HazardConfig {
            worker_count: 0,
            ..HazardConfig::default()
        };
        assert!(matches!(
            PipelineBuilder::new()
                .config(config)
                .normalizer(Arc::new(Fixed))
                .build(),
            Err(BuildError::NoWorkers)
        ));
    }

    #[tokio::test]
    async fn submit_resolve_and_fetch() {
        let config = HazardConfig {
            worker_count: 2,
            poll_interval: Duration::from_millis(10),
            ..HazardConfig::default()
        };
        let pipeline = PipelineBuilder::new()
            .config(config)
            .normalizer(Arc::new(Fixed))
            .build()
            .unwrap();
        let workers = pipeline.start_workers();

        let key = pipeline.submit("東京都千代田区丸の内1-9-1").await.unwrap();
        let view = pipeline.wait_for_terminal(&key).await.unwrap();
        workers.shutdown_and_join().await;

        let LookupView::Complete { data } = view else {
            panic!("expected a complete lookup");
        };
        assert!(data.flood.ends_with("/17/116423/51613.png"));
        assert_eq!(pipeline.fetch(key.as_str()).await.unwrap(), LookupView::Complete { data });
    }

    #[tokio::test]
    async fn wait_gives_up_with_pending() {
        let pipeline = PipelineBuilder::new()
            .normalizer(Arc::new(Fixed))
            .build()
            .unwrap();
        let key = pipeline.submit("東京都").await.unwrap();

        let view = pipeline
            .wait_with(&key, Duration::from_millis(10), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(view, LookupView::Pending);
    }
}
