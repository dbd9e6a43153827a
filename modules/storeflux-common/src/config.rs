use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::types::SiteId;

/// How configuration errors (unregistered action kinds, foreign actions) are
/// surfaced at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisconfigurationMode {
    /// Fail fast. The default for debug builds.
    Panic,
    /// Log, resolve the action's completion with a configuration error, and
    /// keep the process alive. The default for release builds.
    Reject,
}

impl MisconfigurationMode {
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Reject
        }
    }
}

impl Default for MisconfigurationMode {
    fn default() -> Self {
        Self::for_build()
    }
}

impl FromStr for MisconfigurationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Self::Panic),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unsupported misconfiguration mode `{other}`; expected panic|reject"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of recorded remote responses replayed by the fixture remote.
    pub fixtures_dir: PathBuf,
    /// JSON snapshot backing the persistent store. In-memory when unset.
    pub snapshot_path: Option<PathBuf>,
    pub site_id: SiteId,
    pub coupon_page_size: u32,
    pub misconfiguration: MisconfigurationMode,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            fixtures_dir: PathBuf::from(required_env("STOREFLUX_FIXTURES_DIR")),
            snapshot_path: env::var("STOREFLUX_SNAPSHOT_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            site_id: SiteId(parsed_env("STOREFLUX_SITE_ID", 1)),
            coupon_page_size: coupon_page_size(env::var("STOREFLUX_COUPON_PAGE_SIZE").ok())
                .unwrap_or_else(|err| panic!("STOREFLUX_COUPON_PAGE_SIZE: {err}")),
            misconfiguration: env::var("STOREFLUX_MISCONFIGURATION")
                .ok()
                .map(|value| {
                    value
                        .parse()
                        .unwrap_or_else(|err: String| panic!("STOREFLUX_MISCONFIGURATION: {err}"))
                })
                .unwrap_or_default(),
        }
    }

    /// Log the loaded configuration. Nothing here is secret today, but paths
    /// are logged by file name only.
    pub fn log_redacted(&self) {
        let snapshot = self
            .snapshot_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string());

        info!(
            site_id = %self.site_id,
            coupon_page_size = self.coupon_page_size,
            misconfiguration = ?self.misconfiguration,
            snapshot = snapshot.as_str(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}

const DEFAULT_COUPON_PAGE_SIZE: u32 = 25;

/// A page size of zero would never report a last page.
fn coupon_page_size(raw: Option<String>) -> Result<u32, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_COUPON_PAGE_SIZE);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(_) => Err(format!("`{raw}` is not a number")),
    }
}
