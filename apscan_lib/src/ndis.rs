/** ------------------------------------------------------------
 * NDIS-backed scan provider.
 *
 * The OS bridge performs the OID requests and returns the raw
 * NDIS_802_11_BSSID_LIST_EX buffer; this module decodes it into
 * RawBssRecords.
 * ------------------------------------------------------------- */
use crate::errors::ScanError;
use crate::ie::decode_ies;
use crate::provider::{AdapterHandle, NetworkSnapshot, ProviderEvent, ProviderEvents, ScanProvider};
use crate::record::{Bssid, RawBssRecord, SignalReading};
use crate::security::classify;
use crate::util::ByteCursor;
use std::time::Duration;
use tokio::sync::broadcast;

/// Fixed part of NDIS_WLAN_BSSID_EX, up to and including IELength.
pub const BSSID_EX_HEADER_LEN: usize = 116;

/// NDIS_802_11_FIXED_IEs: timestamp, beacon interval, capabilities.
pub const FIXED_IES_LEN: usize = 12;

const SSID_FIELD_LEN: usize = 32;
const RATES_FIELD_LEN: usize = 16;

/**
 * Operations the OS/driver bridge exposes for one adapter
 */
pub trait NdisBridge: Send {
    /// Whether the adapter exists and can be queried.
    fn is_present(&self, adapter: &AdapterHandle) -> bool;

    /// OID_802_11_BSSID_LIST_SCAN
    fn request_scan(&mut self, adapter: &AdapterHandle) -> bool;

    /// OID_802_11_BSSID_LIST, raw buffer
    fn query_bssid_list(&mut self, adapter: &AdapterHandle) -> Option<Vec<u8>>;

    /// OID_802_11_BSSID of the current association
    fn query_connected(&mut self, adapter: &AdapterHandle) -> Option<[u8; 6]>;
}

/**
 * Decode an NDIS_802_11_BSSID_LIST_EX buffer
 *
 * Entries are variable length, each starting with its own length. An
 * entry that is shorter than the fixed header or runs past the buffer
 * ends decoding; what was decoded before it is kept.
 */
pub fn parse_bssid_list(bytes: &[u8]) -> Vec<RawBssRecord> {
    let mut cursor = ByteCursor::new(bytes);
    let Some(count) = cursor.read_u32_le() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for index in 0..count {
        let Some(entry_len) = ByteCursor::new(cursor.rest()).read_u32_le() else {
            break;
        };
        let entry_len = entry_len as usize;
        if entry_len < BSSID_EX_HEADER_LEN {
            tracing::debug!(index, entry_len, "BSSID entry shorter than its header");
            break;
        }
        let Some(entry) = cursor.read_bytes(entry_len) else {
            tracing::debug!(
                index,
                entry_len,
                available = cursor.remaining(),
                "BSSID entry truncated"
            );
            break;
        };
        if let Some(record) = parse_bssid_entry(entry) {
            records.push(record);
        }
    }

    if records.len() < count as usize {
        tracing::debug!(declared = count, decoded = records.len(), "short BSSID list");
    }
    records
}

/**
 * Decode one NDIS_WLAN_BSSID_EX entry
 */
fn parse_bssid_entry(entry: &[u8]) -> Option<RawBssRecord> {
    let mut cursor = ByteCursor::new(entry);

    cursor.skip(4)?; // Length
    let bssid = cursor.read_array::<6>()?;
    cursor.skip(2)?; // Reserved
    let ssid_len = cursor.read_u32_le()?;
    let ssid = cursor.read_array::<SSID_FIELD_LEN>()?;
    let privacy = cursor.read_u32_le()? != 0;
    let rssi = cursor.read_i32_le()?;
    let _network_type_in_use = cursor.read_u32_le()?;

    // NDIS_802_11_CONFIGURATION: Length, BeaconPeriod, ATIMWindow, DSConfig, FHConfig
    cursor.skip(12)?;
    let ds_config_khz = cursor.read_u32_le()?;
    cursor.skip(16)?;

    let infrastructure_mode = cursor.read_u32_le()?;
    let supported_rates = cursor.read_array::<RATES_FIELD_LEN>()?;
    let ie_len = cursor.read_u32_le()? as usize;

    // Variable IEs follow the fixed ones
    let declared_ies = ie_len.saturating_sub(FIXED_IES_LEN);
    let ies = match cursor.skip(FIXED_IES_LEN) {
        Some(()) => {
            let rest = cursor.rest();
            rest[..declared_ies.min(rest.len())].to_vec()
        }
        None => Vec::new(),
    };

    let decoded = decode_ies(&ies, declared_ies);
    let (authentication, cipher) = classify(privacy, decoded.rsn.as_ref(), decoded.wpa.as_ref());

    Some(RawBssRecord {
        bssid,
        ssid: ssid.to_vec(),
        ssid_len: ssid_len.min(SSID_FIELD_LEN as u32),
        frequency_khz: ds_config_khz,
        signal: SignalReading::Rssi(rssi),
        supported_rates: supported_rates.to_vec(),
        ie_len: declared_ies as u32,
        ies,
        infrastructure_mode,
        authentication: authentication.as_str().to_string(),
        cipher: cipher.as_str().to_string(),
    })
}

/**
 * Scan provider over an NDIS bridge
 */
pub struct NdisScanProvider<B: NdisBridge> {
    bridge: B,
    adapter: Option<AdapterHandle>,
    events: ProviderEvents,
}

impl<B: NdisBridge> NdisScanProvider<B> {
    pub fn new(bridge: B, settle_delay: Duration) -> Self {
        Self {
            bridge,
            adapter: None,
            events: ProviderEvents::new(settle_delay),
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

impl<B: NdisBridge> ScanProvider for NdisScanProvider<B> {
    fn init(&mut self, adapter: Option<AdapterHandle>) -> Result<(), ScanError> {
        let adapter = adapter.ok_or_else(|| ScanError::InvalidAdapter("no adapter".into()))?;
        if !adapter.is_valid() || !self.bridge.is_present(&adapter) {
            return Err(ScanError::InvalidAdapter(adapter.name));
        }

        tracing::info!(adapter = %adapter, "NDIS provider bound");
        self.adapter = Some(adapter);
        Ok(())
    }

    fn scan(&mut self) -> bool {
        let Some(adapter) = &self.adapter else {
            self.events.interface_error(ScanError::NotInitialized);
            return false;
        };

        if !self.bridge.request_scan(adapter) {
            let err = ScanError::ScanRequestFailed {
                adapter: adapter.name.clone(),
            };
            self.events.interface_error(err);
            return false;
        }

        self.events.arm_settle_timer();
        true
    }

    fn network_data(&mut self) -> Result<NetworkSnapshot, ScanError> {
        let adapter = self.adapter.as_ref().ok_or(ScanError::NotInitialized)?;

        let bytes = self
            .bridge
            .query_bssid_list(adapter)
            .ok_or_else(|| ScanError::QueryFailed(adapter.name.clone()))?;
        let records = parse_bssid_list(&bytes);
        let connected = self
            .bridge
            .query_connected(adapter)
            .map(Bssid)
            .filter(|bssid| !bssid.is_zero());

        tracing::debug!(records = records.len(), connected = ?connected, "BSSID list queried");
        Ok(NetworkSnapshot {
            records,
            connected,
            captured_at: None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn adapter(&self) -> Option<&AdapterHandle> {
        self.adapter.as_ref()
    }
}
