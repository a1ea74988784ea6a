/** ------------------------------------------------------------
 * Raw BSS records as delivered by a provider, and the normalized
 * per-observation sample built from them.
 * ------------------------------------------------------------- */
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/**
 * 48-bit BSSID
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bssid(pub [u8; 6]);

impl Bssid {
    /// All-zero address, used by drivers for "no entry".
    pub const ZERO: Bssid = Bssid([0; 6]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for Bssid {
    fn from(octets: [u8; 6]) -> Self {
        Bssid(octets)
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid BSSID: {0}")]
pub struct BssidParseError(pub String);

impl FromStr for Bssid {
    type Err = BssidParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| BssidParseError(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| BssidParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(BssidParseError(s.to_string()));
        }
        Ok(Bssid(octets))
    }
}

/**
 * Signal strength as reported by the driver
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignalReading {
    /// Direct RSSI in dBm.
    Rssi(i32),
    /// Percentage link quality, nominally 0-100.
    LinkQuality(u32),
}

/**
 * BSS network type, from the driver's infrastructure-mode code
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Infrastructure,
    Adhoc,
    AutoUnknown,
}

impl NetworkType {
    /// Code values follow NDIS_802_11_NETWORK_INFRASTRUCTURE.
    pub fn from_code(code: u32) -> NetworkType {
        match code {
            0 => NetworkType::Adhoc,
            1 => NetworkType::Infrastructure,
            _ => NetworkType::AutoUnknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Infrastructure => "Infrastructure",
            NetworkType::Adhoc => "Adhoc",
            NetworkType::AutoUnknown => "Auto or unknown",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/**
 * One BSS entry exactly as the provider handed it over
 *
 * Lengths are the declared ones; the byte vectors may be shorter than
 * declared when the source was truncated.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct RawBssRecord {
    pub bssid: [u8; 6],
    pub ssid: Vec<u8>,
    pub ssid_len: u32,
    pub frequency_khz: u32,
    pub signal: SignalReading,
    pub supported_rates: Vec<u8>,
    pub ies: Vec<u8>,
    pub ie_len: u32,
    pub infrastructure_mode: u32,
    pub authentication: String,
    pub cipher: String,
}

impl Default for RawBssRecord {
    fn default() -> Self {
        Self {
            bssid: [0; 6],
            ssid: Vec::new(),
            ssid_len: 0,
            frequency_khz: 0,
            signal: SignalReading::LinkQuality(0),
            supported_rates: Vec::new(),
            ies: Vec::new(),
            ie_len: 0,
            infrastructure_mode: 1,
            authentication: String::new(),
            cipher: String::new(),
        }
    }
}

/**
 * One observation of one access point at one instant
 */
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSample {
    pub bssid: Bssid,
    pub ssid: String,
    pub channel: u32,
    pub rssi_dbm: i32,
    /// Mb/s, ascending, no duplicates.
    pub rates: Vec<f64>,
    pub is_high_throughput: bool,
    pub security: String,
    pub network_type: NetworkType,
    pub connected: bool,
    pub timestamp: DateTime<Utc>,
}

impl NetworkSample {
    pub fn max_rate(&self) -> Option<f64> {
        self.rates.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bssid_display_and_parse() {
        let bssid = Bssid([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0xff]);
        assert_eq!(bssid.to_string(), "00:1a:2b:3c:4d:ff");
        assert_eq!("00:1A:2B:3C:4D:FF".parse::<Bssid>(), Ok(bssid));
        assert_eq!("00-1a-2b-3c-4d-ff".parse::<Bssid>(), Ok(bssid));
    }

    #[test]
    fn bssid_parse_rejects_bad_input() {
        assert!("00:1a:2b:3c:4d".parse::<Bssid>().is_err());
        assert!("00:1a:2b:3c:4d:ff:00".parse::<Bssid>().is_err());
        assert!("00:1a:2b:3c:4d:zz".parse::<Bssid>().is_err());
        assert!("001a2b3c4dff".parse::<Bssid>().is_err());
    }

    #[test]
    fn zero_bssid() {
        assert!(Bssid::ZERO.is_zero());
        assert!(Bssid::default().is_zero());
        assert!(!Bssid([0, 0, 0, 0, 0, 1]).is_zero());
    }

    #[test]
    fn network_type_strings() {
        assert_eq!(NetworkType::from_code(0).as_str(), "Adhoc");
        assert_eq!(NetworkType::from_code(1).as_str(), "Infrastructure");
        assert_eq!(NetworkType::from_code(2).as_str(), "Auto or unknown");
        assert_eq!(NetworkType::from_code(77), NetworkType::AutoUnknown);
    }
}
