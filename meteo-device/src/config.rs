//! Daemon config: defaults, then `meteo-device.toml`, then env overrides.

use serde::Deserialize;
use std::path::PathBuf;

/// Env overrides: METEO_DEVICE_LISTEN, METEO_DEVICE_STORE, METEO_DEVICE_CAPACITY.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the protocol endpoint listens on (default 127.0.0.1:4850).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Path of the persistent image file (default ./meteo-device.eeprom).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Log capacity used when the persistent block is reset (default 30).
    #[serde(default = "default_log_capacity")]
    pub log_capacity: u8,
}

fn default_listen_addr() -> String {
    "127.0.0.1:4850".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("meteo-device.eeprom")
}
fn default_log_capacity() -> u8 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store_path: default_store_path(),
            log_capacity: default_log_capacity(),
        }
    }
}

/// Load config: defaults, then the config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("METEO_DEVICE_LISTEN") {
        c.listen_addr = s;
    }
    if let Ok(s) = std::env::var("METEO_DEVICE_STORE") {
        c.store_path = PathBuf::from(s);
    }
    if let Ok(s) = std::env::var("METEO_DEVICE_CAPACITY") {
        if let Ok(n) = s.parse::<u8>() {
            c.log_capacity = n;
        }
    }
    c
}

fn load_file() -> Option<Config> {
    let s = std::fs::read_to_string("meteo-device.toml").ok()?;
    toml::from_str(&s).ok()
}
