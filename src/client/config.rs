use std::{path::PathBuf, str::FromStr, time::Duration};

use log::warn;

use crate::download::{DownloadSettings, DownloadSettingsBuilder};

/// Configuration settings for the client
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory new downloads are placed in, one folder per download
    pub download_dir: PathBuf,
    /// File listing every known download
    pub index_path: PathBuf,

    // Scheduler Settings
    /// Number of pieces between two checkpoints
    pub batch_size: usize,
    /// Number of pieces between two explicit yields to the runtime
    pub yield_every: usize,
    /// Interval between checks of a paused download
    pub pause_poll_interval: Duration,

    /// Settings for downloads added without their own
    pub default_settings: DownloadSettings,
}

#[allow(dead_code)]
impl Config {
    pub fn with_index_path(mut self, path: PathBuf) -> Self {
        self.index_path = path;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_yield_every(mut self, n: usize) -> Self {
        self.yield_every = n;
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub fn with_default_settings(mut self, settings: DownloadSettings) -> Self {
        self.default_settings = settings;
        self
    }
}

impl Config {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            index_path: PathBuf::from("download_state.json"),
            batch_size: 20,
            yield_every: 5,
            pause_poll_interval: Duration::from_millis(100),
            default_settings: DownloadSettings::default(),
        }
    }

    /// Defaults overlaid with `BT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let download_dir = lookup("BT_DOWNLOAD_DIR").unwrap_or_else(|| "downloads".to_string());
        let mut config = Self::new(PathBuf::from(download_dir));
        if let Some(path) = lookup("BT_INDEX_PATH") {
            config.index_path = PathBuf::from(path);
        }
        if let Some(n) = parse(&lookup, "BT_BATCH_SIZE") {
            config.batch_size = n;
        }

        let mut settings = DownloadSettingsBuilder::default();
        if let Some(ms) = parse::<f64>(&lookup, "BT_SIMULATION_DELAY_MS") {
            settings.simulation_delay(ms / 1000.0);
        }
        if let Some(limit) = parse(&lookup, "BT_DEFAULT_SPEED_LIMIT") {
            settings.speed_limit(limit);
        }
        if let Some(auto_stop) = parse(&lookup, "BT_DEFAULT_AUTO_STOP") {
            settings.auto_stop(auto_stop);
        }
        config.default_settings = settings.build().unwrap_or_default();
        config
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring {}={:?}: not a valid value", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);

        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.index_path, PathBuf::from("download_state.json"));
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.yield_every, 5);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(100));
        assert_eq!(config.default_settings, DownloadSettings::default());
    }

    #[test]
    fn overlay_environment() {
        let config = config(&[
            ("BT_DOWNLOAD_DIR", "/tmp/out"),
            ("BT_INDEX_PATH", "/tmp/index.json"),
            ("BT_BATCH_SIZE", "8"),
            ("BT_SIMULATION_DELAY_MS", "2"),
            ("BT_DEFAULT_SPEED_LIMIT", "4096"),
            ("BT_DEFAULT_AUTO_STOP", "false"),
        ]);

        assert_eq!(config.download_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.index_path, PathBuf::from("/tmp/index.json"));
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.default_settings.simulation_delay, 0.002);
        assert_eq!(config.default_settings.speed_limit, 4096);
        assert!(!config.default_settings.auto_stop);
        assert_eq!(config.default_settings.max_peers, 50);
    }

    #[test]
    fn ignore_invalid_values() {
        let config = config(&[("BT_BATCH_SIZE", "many"), ("BT_DEFAULT_AUTO_STOP", "yes")]);

        assert_eq!(config.batch_size, 20);
        assert!(config.default_settings.auto_stop);
    }
}
