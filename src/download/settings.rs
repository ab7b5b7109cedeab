use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Upper bound of `simulation_delay`, in seconds.
pub const MAX_SIMULATION_DELAY: f64 = 3600.0;

/// Per-download tuning, replaced as a whole on update.
///
/// Peer and timeout limits are carried and persisted but have no effect on
/// the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(default)]
#[serde(default)]
pub struct DownloadSettings {
    /// Bytes per second, 0 for unbounded.
    pub speed_limit: u64,
    pub upload_limit: u64,
    pub max_peers: u32,
    pub max_connections: u32,
    /// Seconds.
    pub piece_timeout: u64,
    /// Seconds.
    pub request_timeout: u64,
    /// Enter `Completed` once every piece is in.
    pub auto_stop: bool,
    pub sequential_download: bool,
    pub verify_pieces: bool,
    /// Size output files to their final length before writing.
    pub pre_allocate: bool,
    /// Seconds to wait per piece when there is no speed limit.
    pub simulation_delay: f64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            speed_limit: 0,
            upload_limit: 0,
            max_peers: 50,
            max_connections: 100,
            piece_timeout: 30,
            request_timeout: 60,
            auto_stop: true,
            sequential_download: false,
            verify_pieces: true,
            pre_allocate: true,
            simulation_delay: 0.005,
        }
    }
}

impl DownloadSettings {
    /// Pause applied before producing each piece.
    pub fn piece_delay(&self) -> Duration {
        if self.speed_limit > 0 {
            Duration::from_secs_f64(1024.0 / self.speed_limit as f64)
        } else {
            let secs = self.simulation_delay.clamp(0.0, MAX_SIMULATION_DELAY);
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
        }
    }

    /// Whether the delay is a finite number of seconds within bounds.
    pub fn is_valid(&self) -> bool {
        self.simulation_delay.is_finite()
            && (0.0..=MAX_SIMULATION_DELAY).contains(&self.simulation_delay)
    }
}
