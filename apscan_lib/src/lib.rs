pub mod cache;
pub mod capture;
pub mod channel;
pub mod config;
pub mod controller;
mod errors;
pub mod ht_capability;
pub mod ie;
pub mod ndis;
pub mod normalize;
mod persistence;
pub mod provider;
pub mod radiotap;
pub mod record;
pub mod security;
pub mod util;

pub use cache::{AccessPoint, AccessPointCache, Rgb, RssiStats, SharedCache};
pub use capture::{decode_capture, CaptureMode, CaptureScanProvider};
pub use config::ScanConfig;
pub use controller::{
    ControllerEvent, ControllerState, CycleReport, ScanController, ScanSession,
};
pub use errors::{ConfigError, ControllerError, ScanError};
pub use ndis::{NdisBridge, NdisScanProvider};
pub use normalize::normalize;
pub use provider::{AdapterHandle, NetworkSnapshot, ProviderEvent, ScanProvider};
pub use record::{Bssid, NetworkSample, NetworkType, RawBssRecord, SignalReading};
