/** ------------------------------------------------------------
 * Radiotap header decoding (only the fields a scan needs).
 * ------------------------------------------------------------- */
use crate::util::ByteCursor;

const PRESENT_TSFT: u32 = 1 << 0;
const PRESENT_FLAGS: u32 = 1 << 1;
const PRESENT_RATE: u32 = 1 << 2;
const PRESENT_CHANNEL: u32 = 1 << 3;
const PRESENT_FHSS: u32 = 1 << 4;
const PRESENT_ANTENNA_SIGNAL: u32 = 1 << 5;
const PRESENT_EXT: u32 = 1 << 31;

/// Flags field: frame includes the 4-byte FCS at the end.
const FLAG_FCS_AT_END: u8 = 0x10;

// Radiotap header fixed part: version, pad, length, first present word
const MIN_HEADER_LEN: usize = 8;

/**
 * Fields extracted from a radiotap header
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadiotapInfo {
    /// Total header length, i.e. offset of the 802.11 frame.
    pub header_len: usize,
    pub tsft: Option<u64>,
    pub flags: Option<u8>,
    /// Data rate in 500 kb/s units.
    pub rate: Option<u8>,
    pub channel_freq_mhz: Option<u16>,
    pub channel_flags: Option<u16>,
    pub antenna_signal_dbm: Option<i8>,
}

impl RadiotapInfo {
    pub fn has_fcs(&self) -> bool {
        self.flags.is_some_and(|flags| flags & FLAG_FCS_AT_END != 0)
    }

    pub fn channel_freq_khz(&self) -> Option<u32> {
        self.channel_freq_mhz
            .filter(|&mhz| mhz != 0)
            .map(|mhz| mhz as u32 * 1000)
    }
}

/**
 * Parse the radiotap header at the start of a packet
 *
 * Returns `None` when the header is shorter than its fixed part or
 * claims more bytes than the packet has. Fields that do not fit in the
 * declared header are left unset.
 */
pub fn parse_radiotap(packet: &[u8]) -> Option<RadiotapInfo> {
    let mut cursor = ByteCursor::new(packet);
    let _version = cursor.read_u8()?;
    cursor.skip(1)?;
    let header_len = cursor.read_u16_le()? as usize;
    if header_len < MIN_HEADER_LEN || header_len > packet.len() {
        return None;
    }

    // Fields are aligned relative to the header start
    let mut cursor = ByteCursor::with_limit(packet, header_len);
    cursor.skip(4)?;
    let present = cursor.read_u32_le()?;
    let mut word = present;
    while word & PRESENT_EXT != 0 {
        word = cursor.read_u32_le()?;
    }

    let mut info = RadiotapInfo {
        header_len,
        ..Default::default()
    };
    read_fields(&mut cursor, present, &mut info);
    Some(info)
}

fn read_fields(cursor: &mut ByteCursor, present: u32, info: &mut RadiotapInfo) -> Option<()> {
    if present & PRESENT_TSFT != 0 {
        cursor.align_to(8)?;
        info.tsft = Some(u64::from_le_bytes(cursor.read_array::<8>()?));
    }
    if present & PRESENT_FLAGS != 0 {
        info.flags = Some(cursor.read_u8()?);
    }
    if present & PRESENT_RATE != 0 {
        info.rate = Some(cursor.read_u8()?);
    }
    if present & PRESENT_CHANNEL != 0 {
        cursor.align_to(2)?;
        info.channel_freq_mhz = Some(cursor.read_u16_le()?);
        info.channel_flags = Some(cursor.read_u16_le()?);
    }
    if present & PRESENT_FHSS != 0 {
        cursor.skip(2)?;
    }
    if present & PRESENT_ANTENNA_SIGNAL != 0 {
        info.antenna_signal_dbm = Some(cursor.read_u8()? as i8);
    }
    Some(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Radiotap header with flags, rate, channel and antenna signal.
    pub(crate) fn radiotap_header(freq_mhz: u16, signal_dbm: i8, flags: u8) -> Vec<u8> {
        let present = PRESENT_FLAGS | PRESENT_RATE | PRESENT_CHANNEL | PRESENT_ANTENNA_SIGNAL;
        let mut header = vec![0, 0, 0, 0];
        header.extend(present.to_le_bytes());
        header.push(flags); // offset 8
        header.push(2); // rate, offset 9
        header.extend(freq_mhz.to_le_bytes()); // offset 10, already aligned
        header.extend(0x00a0u16.to_le_bytes());
        header.push(signal_dbm as u8);
        let len = header.len() as u16;
        header[2..4].copy_from_slice(&len.to_le_bytes());
        header
    }

    #[test]
    fn parses_common_fields() {
        let header = radiotap_header(2437, -48, 0x10);
        let info = parse_radiotap(&header).unwrap();

        assert_eq!(info.header_len, 15);
        assert_eq!(info.rate, Some(2));
        assert_eq!(info.channel_freq_khz(), Some(2_437_000));
        assert_eq!(info.antenna_signal_dbm, Some(-48));
        assert!(info.has_fcs());
        assert!(info.tsft.is_none());
    }

    #[test]
    fn aligns_after_tsft_and_extended_bitmaps() {
        let present = PRESENT_TSFT | PRESENT_CHANNEL | PRESENT_ANTENNA_SIGNAL | PRESENT_EXT;
        let mut header = vec![0, 0, 0, 0];
        header.extend(present.to_le_bytes());
        header.extend(0u32.to_le_bytes()); // second present word, offset 8
        header.extend([0u8; 4]); // pad to 8, offset 12
        header.extend(0x0102_0304_0506_0708u64.to_le_bytes()); // offset 16
        header.extend(5180u16.to_le_bytes()); // offset 24
        header.extend(0x0140u16.to_le_bytes());
        header.push((-70i8) as u8);
        let len = header.len() as u16;
        header[2..4].copy_from_slice(&len.to_le_bytes());

        let info = parse_radiotap(&header).unwrap();
        assert_eq!(info.tsft, Some(0x0102_0304_0506_0708));
        assert_eq!(info.channel_freq_mhz, Some(5180));
        assert_eq!(info.antenna_signal_dbm, Some(-70));
        assert!(!info.has_fcs());
    }

    #[test]
    fn rejects_bad_header_length() {
        let mut header = radiotap_header(2412, -40, 0);
        header[2..4].copy_from_slice(&200u16.to_le_bytes());
        assert!(parse_radiotap(&header).is_none());
        assert!(parse_radiotap(&[0, 0, 4, 0]).is_none());
    }

    #[test]
    fn truncated_fields_are_left_unset() {
        let mut header = radiotap_header(2412, -40, 0);
        header.truncate(13);
        header[2..4].copy_from_slice(&13u16.to_le_bytes());

        let info = parse_radiotap(&header).unwrap();
        assert_eq!(info.channel_freq_mhz, Some(2412));
        assert_eq!(info.channel_flags, None);
        assert_eq!(info.antenna_signal_dbm, None);
    }
}
