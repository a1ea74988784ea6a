/** ------------------------------------------------------------
 * Scan session configuration (TOML).
 * ------------------------------------------------------------- */
use crate::cache::DEFAULT_MAX_HISTORY;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/**
 * Timing and retention knobs of a scan session
 *
 * Every key is optional in the file; missing keys take the defaults.
 */
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Delay between a scan request and `ScanComplete`.
    pub settle_delay_ms: u64,
    /// Longest wait for `ScanComplete` before results are read anyway.
    pub settle_timeout_ms: u64,
    /// Pause between the end of a cycle and the next scan request.
    pub inter_scan_delay_ms: u64,
    /// Samples older than the newest sample minus this are pruned.
    pub retention_secs: u64,
    pub max_history: usize,
    /// Capture time consumed per scan when replaying a file.
    pub replay_window_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            settle_timeout_ms: 5000,
            inter_scan_delay_ms: 0,
            retention_secs: 300,
            max_history: DEFAULT_MAX_HISTORY,
            replay_window_ms: 1000,
        }
    }
}

impl ScanConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn inter_scan_delay(&self) -> Duration {
        Duration::from_millis(self.inter_scan_delay_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn replay_window(&self) -> Duration {
        Duration::from_millis(self.replay_window_ms)
    }
}
