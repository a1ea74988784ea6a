/** ------------------------------------------------------------
 * HT (802.11n) capabilities element body.
 * ------------------------------------------------------------- */
use crate::util::ByteCursor;
use bilge::prelude::*;

/// Rate added for an HT network whose element lists no usable MCS.
pub const HT_IMPLIED_RATE_MBPS: f64 = 65.0;

// Data bits per OFDM symbol for MCS 0-7 on a single stream
const NDBPS_20MHZ: [u32; 8] = [26, 52, 78, 104, 156, 208, 234, 260];
const NDBPS_40MHZ: [u32; 8] = [54, 108, 162, 216, 324, 432, 486, 540];

// MCS 0-31 are the equal-modulation indexes for one to four streams
const EQUAL_MODULATION_MCS: u8 = 32;

/**
 * HT Capability Information field (2 bytes, LSB first)
 */
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct HtCapabilityInfo {
    pub ldpc_coding: bool,
    pub channel_width_40: bool,
    pub sm_power_save: u2,
    pub greenfield: bool,
    pub short_gi_20: bool,
    pub short_gi_40: bool,
    pub tx_stbc: bool,
    pub rx_stbc: u2,
    pub delayed_block_ack: bool,
    pub max_amsdu_7935: bool,
    pub dsss_cck_40: bool,
    pub psmp: bool,
    pub forty_mhz_intolerant: bool,
    pub lsig_txop_protection: bool,
}

/**
 * Decoded HT capabilities element
 *
 * Only the fixed fields are kept; the MCS bitmask is what the rate
 * derivation needs.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct HtCapability {
    pub info: HtCapabilityInfo,
    pub ampdu_params: u8,
    pub rx_mcs_bitmask: [u8; 10],
    pub rx_highest_rate: u16,
    pub tx_mcs_params: u8,
    pub extended_capabilities: u16,
    pub txbf_capabilities: u32,
    pub asel_capabilities: u8,
}

impl HtCapability {
    /// Length of the element body defined by 802.11n.
    pub const BODY_LEN: usize = 26;

    /**
     * Decode from an element body. Returns `None` if the body is shorter
     * than the fixed fields.
     */
    pub fn from_bytes(body: &[u8]) -> Option<Self> {
        let mut cursor = ByteCursor::new(body);
        if cursor.remaining() < Self::BODY_LEN {
            return None;
        }

        let info = HtCapabilityInfo::from(cursor.read_u16_le()?);
        let ampdu_params = cursor.read_u8()?;
        let rx_mcs_bitmask = cursor.read_array::<10>()?;
        let rx_highest_rate = cursor.read_u16_le()? & 0x03ff;
        let tx_mcs_params = cursor.read_u8()?;
        cursor.skip(3)?; // reserved tail of the MCS set
        let extended_capabilities = cursor.read_u16_le()?;
        let txbf_capabilities = cursor.read_u32_le()?;
        let asel_capabilities = cursor.read_u8()?;

        Some(Self {
            info,
            ampdu_params,
            rx_mcs_bitmask,
            rx_highest_rate,
            tx_mcs_params,
            extended_capabilities,
            txbf_capabilities,
            asel_capabilities,
        })
    }

    pub fn supports_mcs(&self, mcs: u8) -> bool {
        let byte = (mcs / 8) as usize;
        byte < self.rx_mcs_bitmask.len() && self.rx_mcs_bitmask[byte] & (1 << (mcs % 8)) != 0
    }

    /**
     * Data rates in Mb/s for every supported equal-modulation MCS.
     *
     * Uses 40 MHz when the 40 MHz channel-width bit is set, and the
     * short guard interval when the matching SGI bit is set. Rates are
     * rounded to 0.1 Mb/s, sorted ascending, without duplicates.
     */
    pub fn rates(&self) -> Vec<f64> {
        let wide = self.info.channel_width_40();
        let short_gi = if wide {
            self.info.short_gi_40()
        } else {
            self.info.short_gi_20()
        };
        let table = if wide { &NDBPS_40MHZ } else { &NDBPS_20MHZ };
        let symbol_us = if short_gi { 3.6 } else { 4.0 };

        let mut rates: Vec<f64> = (0..EQUAL_MODULATION_MCS)
            .filter(|&mcs| self.supports_mcs(mcs))
            .map(|mcs| {
                let streams = (mcs / 8 + 1) as f64;
                let ndbps = table[(mcs % 8) as usize] as f64;
                (streams * ndbps / symbol_us * 10.0).round() / 10.0
            })
            .collect();

        rates.sort_by(f64::total_cmp);
        rates.dedup();
        rates
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// HT capabilities body with the given info field and MCS bytes 0..4.
    pub(crate) fn ht_body(info: u16, mcs: [u8; 4]) -> Vec<u8> {
        let mut body = vec![0u8; HtCapability::BODY_LEN];
        body[0..2].copy_from_slice(&info.to_le_bytes());
        body[2] = 0x17;
        body[3..7].copy_from_slice(&mcs);
        body
    }

    #[test]
    fn decodes_capability_info_bits() {
        // LDPC, 40 MHz, SGI20, SGI40, max A-MSDU 7935
        let body = ht_body(0b0000_1000_0110_0011, [0xff, 0, 0, 0]);
        let ht = HtCapability::from_bytes(&body).unwrap();

        assert!(ht.info.ldpc_coding());
        assert!(ht.info.channel_width_40());
        assert!(ht.info.short_gi_20());
        assert!(ht.info.short_gi_40());
        assert!(ht.info.max_amsdu_7935());
        assert!(!ht.info.greenfield());
        assert_eq!(ht.info.rx_stbc().value(), 0);
        assert_eq!(ht.ampdu_params, 0x17);
    }

    #[test]
    fn short_body_is_rejected() {
        let body = ht_body(0, [0xff, 0, 0, 0]);
        assert!(HtCapability::from_bytes(&body[..HtCapability::BODY_LEN - 1]).is_none());
        assert!(HtCapability::from_bytes(&[]).is_none());
    }

    #[test]
    fn single_stream_20mhz_long_gi() {
        let ht = HtCapability::from_bytes(&ht_body(0, [0xff, 0, 0, 0])).unwrap();
        assert_eq!(
            ht.rates(),
            vec![6.5, 13.0, 19.5, 26.0, 39.0, 52.0, 58.5, 65.0]
        );
        assert!(!ht.supports_mcs(8));
    }

    #[test]
    fn two_streams_40mhz_short_gi() {
        // 40 MHz + SGI40
        let ht = HtCapability::from_bytes(&ht_body(0x0042, [0xff, 0xff, 0, 0])).unwrap();
        let rates = ht.rates();

        assert!(ht.supports_mcs(15));
        assert_eq!(rates.first(), Some(&15.0));
        assert_eq!(rates.last(), Some(&300.0));
        // 30, 60, 90 and 120 Mb/s are reachable with one or two streams
        assert_eq!(rates.len(), 12);
    }

    #[test]
    fn empty_mcs_set_has_no_rates() {
        let ht = HtCapability::from_bytes(&ht_body(0, [0, 0, 0, 0])).unwrap();
        assert!(ht.rates().is_empty());
    }
}
