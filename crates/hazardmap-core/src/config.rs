//! Deployment configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use tracing::{debug, warn};

use crate::app::dedup::DedupScheme;
use crate::domain::{DEFAULT_ZOOM, MAX_ZOOM};

const DEFAULT_NORMALIZE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PENDING_STALE_AFTER_SECS: u64 = 300;
const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HAZARDMAP_ZOOM_LEVEL must be between 0 and 24, got {0}")]
    ZoomOutOfRange(i64),

    #[error("HAZARDMAP_WORKER_COUNT must be at least 1")]
    NoWorkers,

    #[error("HAZARDMAP_NORMALIZER_ENDPOINT is not set")]
    MissingNormalizerEndpoint,
}

#[derive(Clone, Debug)]
pub struct HazardConfig {
    pub zoom_level: u8,
    pub normalize_timeout: Duration,
    pub pending_stale_after: Duration,
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub dedup_scheme: DedupScheme,
    pub normalizer_endpoint: Option<String>,
    pub store_dir: Option<PathBuf>,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            zoom_level: DEFAULT_ZOOM,
            normalize_timeout: Duration::from_millis(DEFAULT_NORMALIZE_TIMEOUT_MS),
            pending_stale_after: Duration::from_secs(DEFAULT_PENDING_STALE_AFTER_SECS),
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            dedup_scheme: DedupScheme::AddressDigest,
            normalizer_endpoint: None,
            store_dir: None,
        }
    }
}

impl HazardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv_if_applicable();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key -> value source (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_zoom = parse_or(&lookup, "HAZARDMAP_ZOOM_LEVEL", i64::from(DEFAULT_ZOOM));
        let zoom_level = u8::try_from(raw_zoom)
            .ok()
            .filter(|zoom| *zoom <= MAX_ZOOM)
            .ok_or(ConfigError::ZoomOutOfRange(raw_zoom))?;

        let worker_count = parse_or(&lookup, "HAZARDMAP_WORKER_COUNT", DEFAULT_WORKER_COUNT);
        if worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let dedup_scheme = match lookup("HAZARDMAP_DEDUP_SCHEME") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unknown HAZARDMAP_DEDUP_SCHEME, using digest");
                DedupScheme::AddressDigest
            }),
            None => DedupScheme::AddressDigest,
        };

        Ok(Self {
            zoom_level,
            normalize_timeout: Duration::from_millis(parse_or(
                &lookup,
                "HAZARDMAP_NORMALIZE_TIMEOUT_MS",
                DEFAULT_NORMALIZE_TIMEOUT_MS,
            )),
            pending_stale_after: Duration::from_secs(parse_or(
                &lookup,
                "HAZARDMAP_PENDING_STALE_AFTER_SECS",
                DEFAULT_PENDING_STALE_AFTER_SECS,
            )),
            worker_count,
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "HAZARDMAP_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
            poll_timeout: Duration::from_millis(parse_or(
                &lookup,
                "HAZARDMAP_POLL_TIMEOUT_MS",
                DEFAULT_POLL_TIMEOUT_MS,
            )),
            dedup_scheme,
            normalizer_endpoint: non_blank(lookup("HAZARDMAP_NORMALIZER_ENDPOINT")),
            store_dir: non_blank(lookup("HAZARDMAP_STORE_DIR")).map(PathBuf::from),
        })
    }

    pub fn require_normalizer_endpoint(&self) -> Result<&str, ConfigError> {
        self.normalizer_endpoint
            .as_deref()
            .ok_or(ConfigError::MissingNormalizerEndpoint)
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions)
        || env::var("ALLOW_DOTENV")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
            .unwrap_or(false)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        None => default,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
