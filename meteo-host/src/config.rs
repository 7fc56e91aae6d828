//! Daemon config: defaults, then `meteo-host.toml`, then env overrides.

use serde::Deserialize;

/// Env overrides: METEO_HOST_DEVICE, METEO_HOST_MIRROR_CAPACITY,
/// METEO_HOST_TIMEOUT_MS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Device protocol endpoint (default 127.0.0.1:4850).
    #[serde(default = "default_device_addr")]
    pub device_addr: String,
    /// Local mirror capacity in entries (default 100).
    #[serde(default = "default_mirror_capacity")]
    pub mirror_capacity: usize,
    /// How long a command waits for its reply (default 500 ms).
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

fn default_device_addr() -> String {
    "127.0.0.1:4850".to_string()
}
fn default_mirror_capacity() -> usize {
    100
}
fn default_reply_timeout_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_addr: default_device_addr(),
            mirror_capacity: default_mirror_capacity(),
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }
}

/// Load config: defaults, then the config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("METEO_HOST_DEVICE") {
        c.device_addr = s;
    }
    if let Ok(s) = std::env::var("METEO_HOST_MIRROR_CAPACITY") {
        if let Ok(n) = s.parse::<usize>() {
            c.mirror_capacity = n;
        }
    }
    if let Ok(s) = std::env::var("METEO_HOST_TIMEOUT_MS") {
        if let Ok(n) = s.parse::<u64>() {
            c.reply_timeout_ms = n;
        }
    }
    c
}

fn load_file() -> Option<Config> {
    let s = std::fs::read_to_string("meteo-host.toml").ok()?;
    toml::from_str(&s).ok()
}
