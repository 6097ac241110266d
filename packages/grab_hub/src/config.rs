use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [hub]
//                    window_ms = 1000
//
//   env var:         GRABHUB_HUB__WINDOW_MS=1000   (double underscore = nesting)
//
// (single underscore stays within field names: GRABHUB_HUB__MAX_BATCH)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub hub: HubFileConfig,
}

/// Listen address knobs (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Hub tunables (lives under `[hub]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubFileConfig {
    /// Max latency of a coalescing window, in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Max items per batch on collection channels.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Max items per batch on the per-post details channel.
    #[serde(default = "default_details_max_batch")]
    pub details_max_batch: usize,
    /// Capacity of each session's outbound frame queue.
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Capacity of each live broadcast feed.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl Default for HubFileConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_batch: default_max_batch(),
            details_max_batch: default_details_max_batch(),
            send_queue_capacity: default_send_queue_capacity(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

fn default_window_ms() -> u64 {
    2000
}
fn default_max_batch() -> usize {
    200
}
fn default_details_max_batch() -> usize {
    500
}
fn default_send_queue_capacity() -> usize {
    100
}
fn default_feed_capacity() -> usize {
    256
}

/// Resolved hub configuration (runtime view).
#[derive(Clone, Debug)]
pub struct HubConfig {
    pub window: Duration,
    pub max_batch: usize,
    pub details_max_batch: usize,
    pub send_queue_capacity: usize,
    pub feed_capacity: usize,
}

impl HubConfig {
    pub fn from_file(fc: &HubFileConfig) -> Self {
        Self {
            window: Duration::from_millis(fc.window_ms),
            max_batch: fc.max_batch,
            details_max_batch: fc.details_max_batch,
            send_queue_capacity: fc.send_queue_capacity,
            feed_capacity: fc.feed_capacity,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_file(&HubFileConfig::default())
    }
}

/// Build a figment that layers: defaults → config.toml → GRABHUB_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `GRABHUB_SERVER__PORT=9090`     →  `server.port = 9090`
///   `GRABHUB_HUB__WINDOW_MS=1000`   →  `hub.window_ms = 1000`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("GRABHUB_").split("__"))
}
