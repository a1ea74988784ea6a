/** ------------------------------------------------------------
 * Error types raised by this lib.
 * ------------------------------------------------------------- */
use crate::controller::ControllerState;
use thiserror::Error;

/**
 * Failures of a scan provider or the bridge underneath it.
 *
 * Cloneable so the controller can broadcast it to every subscriber.
 */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Invalid wireless adapter: {0}")]
    InvalidAdapter(String),
    #[error("Scan provider used before init")]
    NotInitialized,
    #[error("Scan request failed on adapter {adapter}")]
    ScanRequestFailed { adapter: String },
    #[error("Querying the BSS list failed: {0}")]
    QueryFailed(String),
    #[error("Capture error: {0}")]
    Capture(String),
}

impl From<pcap::Error> for ScanError {
    fn from(err: pcap::Error) -> Self {
        ScanError::Capture(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Scan cycle already in progress (state: {0:?})")]
    Busy(ControllerState),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Operation not valid in state {0:?}")]
    InvalidState(ControllerState),
    #[error("Scan provider event channel closed")]
    ProviderClosed,
    #[error("Scan session has shut down")]
    SessionClosed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
