/** ------------------------------------------------------------
 * Record normalization: raw driver BSS record -> NetworkSample.
 *
 * Malformed fields degrade to defaults; only the all-zero BSSID
 * discards a record.
 * ------------------------------------------------------------- */
use crate::channel::frequency_to_channel;
use crate::ht_capability::HT_IMPLIED_RATE_MBPS;
use crate::ie::{decode_ies, DecodedIes};
use crate::record::{Bssid, NetworkSample, NetworkType, RawBssRecord, SignalReading};
use crate::security::security_summary;
use chrono::{DateTime, Utc};

// Valid range for a direct RSSI reading
const RSSI_MIN_DBM: i32 = -100;
const RSSI_MAX_DBM: i32 = 0;

/**
 * Normalize one raw record
 *
 * \param raw Record as delivered by the provider
 * \param connected BSSID the adapter is currently associated with
 * \param now Capture time stamped on the sample
 */
pub fn normalize(
    raw: &RawBssRecord,
    connected: Option<Bssid>,
    now: DateTime<Utc>,
) -> Option<NetworkSample> {
    let bssid = Bssid(raw.bssid);
    if bssid.is_zero() {
        tracing::trace!("skipping record with all-zero BSSID");
        return None;
    }

    if raw.ie_len as usize > raw.ies.len() {
        tracing::debug!(
            %bssid,
            declared = raw.ie_len,
            available = raw.ies.len(),
            "IE blob shorter than declared"
        );
    }
    let decoded = decode_ies(&raw.ies, raw.ie_len as usize);

    Some(NetworkSample {
        bssid,
        ssid: decode_ssid(&raw.ssid, raw.ssid_len),
        channel: frequency_to_channel(raw.frequency_khz),
        rssi_dbm: signal_to_dbm(raw.signal),
        rates: merge_rates(&raw.supported_rates, &decoded),
        is_high_throughput: decoded.ht.is_some(),
        security: security_summary(&raw.authentication, &raw.cipher),
        network_type: NetworkType::from_code(raw.infrastructure_mode),
        connected: connected == Some(bssid),
        timestamp: now,
    })
}

/**
 * Percentage link quality to dBm: 0% -> -100 dBm, 100% -> -50 dBm.
 * Values above 100 are treated as 100.
 */
pub fn compute_rssi(link_quality: u32) -> i32 {
    let q = link_quality.min(100) as f64;
    (0.5 * q - 100.0).round() as i32
}

pub fn signal_to_dbm(signal: SignalReading) -> i32 {
    match signal {
        SignalReading::Rssi(dbm) => dbm.clamp(RSSI_MIN_DBM, RSSI_MAX_DBM),
        SignalReading::LinkQuality(q) => compute_rssi(q),
    }
}

/**
 * Supported-rate bytes to Mb/s. The basic-rate bit (0x80) is masked off
 * and the remainder is in units of 500 kb/s. Zero bytes are padding.
 */
pub fn convert_rates(raw: &[u8]) -> Vec<f64> {
    raw.iter()
        .filter(|&&b| b > 0)
        .map(|&b| (b & 0x7f) as f64 * 0.5)
        .collect()
}

/**
 * Legacy and extended rates plus the HT rates, ascending and without
 * duplicates. An HT network that adds no new rate gets the implied
 * 65 Mb/s entry.
 */
fn merge_rates(supported: &[u8], decoded: &DecodedIes) -> Vec<f64> {
    let mut rates = convert_rates(supported);
    rates.extend(convert_rates(&decoded.extended_rates));
    sort_dedup(&mut rates);

    if let Some(ht) = &decoded.ht {
        let before = rates.len();
        rates.extend(ht.rates());
        sort_dedup(&mut rates);
        if rates.len() == before {
            rates.push(HT_IMPLIED_RATE_MBPS);
            sort_dedup(&mut rates);
        }
    }

    rates
}

fn sort_dedup(rates: &mut Vec<f64>) {
    rates.sort_by(f64::total_cmp);
    rates.dedup();
}

/// SSID bytes up to the declared length, lossily decoded and trimmed.
fn decode_ssid(bytes: &[u8], declared_len: u32) -> String {
    let len = (declared_len as usize).min(bytes.len());
    String::from_utf8_lossy(&bytes[..len])
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}
